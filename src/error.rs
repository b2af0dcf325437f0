use rustyline::error::ReadlineError;
use std::io;
use thiserror::Error;

/// Conditions the read-evaluate loop cannot recover from.
///
/// Everything else (syntax errors, redirection and exec failures, built-in
/// misuse) is reported to the user where it happens and never surfaces here.
#[derive(Debug, Error)]
pub enum ShellError {
    /// The OS refused to create a new process.
    #[error("fork() failed: {0}")]
    Fork(#[source] io::Error),
    /// Writing a notice to the terminal failed.
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
    /// The line editor could not read from the terminal.
    #[error("failed to read input: {0}")]
    Editor(#[from] ReadlineError),
}

impl ShellError {
    /// Whether the shell has to terminate after reporting this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ShellError::Fork(_))
    }
}
