//! Pipeline driver: source text through scanner, parser, resolver and
//! evaluator, for both script files and the interactive prompt.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;

use log::info;

use crate::error::Result;
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::reporter::ErrorReporter;
use crate::resolver::Resolver;
use crate::scanner::Scanner;
use crate::stmt::Stmt;
use crate::token::Token;

/// Interpreter session: one reporter, one set of globals, any number of runs.
///
/// # Example
///
/// ```
/// use lox::Lox;
///
/// let mut output: Vec<u8> = Vec::new();
/// let mut driver = Lox::new(&mut output);
///
/// driver.run("func double(x) { return x * 2; }", false);
/// driver.run("print double(21);", false);
///
/// assert!(!driver.had_error());
/// drop(driver);
/// assert_eq!(output, b"42\n");
/// ```
pub struct Lox<W: Write> {
    reporter: ErrorReporter,
    interpreter: Interpreter<W>,
}

impl<W: Write> Lox<W> {
    pub fn new(output: W) -> Self {
        Lox {
            reporter: ErrorReporter::new(),
            interpreter: Interpreter::new(output),
        }
    }

    /// Run a script file once.  Compile/runtime failures are recorded on the
    /// session flags, not returned; the error here is I/O or encoding only.
    pub fn run_file(&mut self, path: &Path) -> Result<()> {
        info!("Running script {}", path.display());

        let bytes = fs::read(path)?;
        let source = String::from_utf8(bytes)?;

        self.reporter.set_context(path.to_str(), &source);
        self.run(&source, false);

        Ok(())
    }

    /// Interactive prompt.  Every line is a soft failure at worst; the error
    /// flags reset between lines.
    pub fn run_prompt(&mut self) -> Result<()> {
        let stdin = io::stdin();
        let mut line = String::new();

        loop {
            print!(">> ");
            io::stdout().flush()?;

            line.clear();
            if stdin.lock().read_line(&mut line)? == 0 {
                break;
            }

            self.reporter.set_context(None, &line);
            self.run(&line, true);
            self.reporter.clear();
        }

        Ok(())
    }

    /// One trip through the pipeline.  Any scan, parse or resolve report
    /// stops the run before evaluation.
    pub fn run(&mut self, source: &str, repl: bool) {
        let mut tokens: Vec<Token> = Vec::new();
        for item in Scanner::new(source.as_bytes().to_vec()) {
            match item {
                Ok(token) => tokens.push(token),

                Err(e) => {
                    let _ = self.reporter.report(e);
                }
            }
        }

        let statements: Vec<Stmt> = Parser::new(tokens, &self.reporter).parse();
        if self.reporter.had_error() {
            return;
        }

        Resolver::new(&mut self.interpreter, &self.reporter).resolve(&statements);
        if self.reporter.had_error() {
            return;
        }

        if let Err(e) = self.interpreter.interpret(&statements, repl) {
            let _ = self.reporter.report(e);
        }
    }

    pub fn had_error(&self) -> bool {
        self.reporter.had_error()
    }

    pub fn had_runtime_error(&self) -> bool {
        self.reporter.had_runtime_error()
    }
}
