use std::io;
use std::path::PathBuf;
use std::process;

use clap::Parser as ClapParser;

use lox::Lox;

/// Tree-walking interpreter for a small Lox-family scripting language.
#[derive(ClapParser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Script to run; starts an interactive prompt when omitted.
    scripts: Vec<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Cli = Cli::parse();

    match args.scripts.as_slice() {
        [] => {
            let mut driver = Lox::new(io::stdout());
            driver.run_prompt()?;
        }

        [script] => {
            let mut driver = Lox::new(io::stdout());
            driver.run_file(script)?;

            if driver.had_error() {
                process::exit(65);
            }
            if driver.had_runtime_error() {
                process::exit(70);
            }
        }

        _ => {
            println!("usage: lox [script]");
            process::exit(64);
        }
    }

    Ok(())
}
