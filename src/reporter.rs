//! Error sink shared by every pipeline stage.
//!
//! Components hand a [`LoxError`] to [`ErrorReporter::report`], which prints a
//! human-readable diagnostic (message, file when known, line, and the
//! offending source line when available), records which class of failure
//! occurred, and hands the error value back so the caller can propagate it
//! with `?` or drop it and keep going.

use std::cell::{Cell, RefCell};

use log::debug;

use crate::error::LoxError;

#[derive(Debug, Default)]
pub struct ErrorReporter {
    file: RefCell<Option<String>>,
    source: RefCell<String>,
    had_error: Cell<bool>,
    had_runtime_error: Cell<bool>,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the file name and source text of the run about to start, so
    /// diagnostics can quote the offending line.
    pub fn set_context(&self, file: Option<&str>, source: &str) {
        *self.file.borrow_mut() = file.map(str::to_string);
        *self.source.borrow_mut() = source.to_string();
    }

    /// Print a diagnostic for `err`, record its class, and carry it back.
    pub fn report(&self, err: LoxError) -> LoxError {
        debug!("Reporting error: {}", err);

        if err.is_compile_error() {
            self.had_error.set(true);
        } else {
            self.had_runtime_error.set(true);
        }

        let file = self.file.borrow();
        let file: &str = file.as_deref().unwrap_or("");

        match err.line() {
            Some(line) => match self.source_line(line) {
                Some(src_line) => {
                    eprintln!(
                        "error: {}\nin file {} on line {}:\n\t{}",
                        err, file, line, src_line
                    );
                }
                None => {
                    eprintln!("error: {}\nin file {} on line {}", err, file, line);
                }
            },
            None => {
                eprintln!("error: {}", err);
            }
        }

        err
    }

    pub fn had_error(&self) -> bool {
        self.had_error.get()
    }

    pub fn had_runtime_error(&self) -> bool {
        self.had_runtime_error.get()
    }

    /// Forget all recorded failures.  The prompt calls this between lines.
    pub fn clear(&self) {
        self.had_error.set(false);
        self.had_runtime_error.set(false);
    }

    fn source_line(&self, line: usize) -> Option<String> {
        self.source
            .borrow()
            .lines()
            .nth(line.checked_sub(1)?)
            .map(str::to_string)
    }
}
