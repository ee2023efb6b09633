use log::info;

use crate::error::LoxError;

/// Diagnostics sink shared by all phases.
///
/// The driver reads the two flags after each phase to decide whether to
/// continue the pipeline and which exit code to hand the process.
#[derive(Debug, Default)]
pub struct Reporter {
    had_error: bool,
    had_runtime_error: bool,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit a diagnostic in the canonical `[line N] Error WHERE: MESSAGE`
    /// shape and latch the matching flag.
    pub fn report(&mut self, line: usize, location: &str, message: &str, is_runtime: bool) {
        info!(
            "Reporting error: line={}, location={:?}, runtime={}",
            line, location, is_runtime
        );

        eprintln!("[line {}] Error{}: {}", line, location, message);

        if is_runtime {
            self.had_runtime_error = true;
        } else {
            self.had_error = true;
        }
    }

    /// Route a structured [`LoxError`] through [`Reporter::report`].
    pub fn error(&mut self, err: &LoxError) {
        match err {
            LoxError::Lex { message, line } => self.report(*line, "", message, false),

            LoxError::Parse {
                message,
                location,
                line,
            }
            | LoxError::Resolve {
                message,
                location,
                line,
            } => self.report(*line, location, message, false),

            LoxError::Runtime {
                message,
                location,
                line,
            } => self.report(*line, location, message, true),

            LoxError::Io(err) => {
                eprintln!("{}", err);
                self.had_error = true;
            }
        }
    }

    pub fn had_error(&self) -> bool {
        self.had_error
    }

    pub fn had_runtime_error(&self) -> bool {
        self.had_runtime_error
    }

    /// Clear both flags; the REPL calls this between lines so one bad
    /// line does not poison the next.
    pub fn reset(&mut self) {
        self.had_error = false;
        self.had_runtime_error = false;
    }
}
