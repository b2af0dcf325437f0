//! A small interactive shell with background jobs.
//!
//! One external command per line, with optional `<` / `>` redirection and a
//! trailing `&` to run it in the background. Finished background jobs are
//! reported before the next prompt. Ctrl-C only reaches foreground children;
//! Ctrl-Z toggles a foreground-only mode in which `&` is ignored.
//!
//! The main entry point is [`Interpreter`], which owns the [`ShellState`]
//! (environment, background process table and last status) and routes every
//! parsed [`Command`] through a set of pluggable built-in factories before
//! falling back to running it as a program. The public modules
//! [`command`] and [`env`] expose traits and types for implementing your own
//! commands and for interacting with the process environment.

mod builtin;
pub mod command;
pub mod config;
pub mod env;
mod error;
mod external;
mod interpreter;
pub mod jobs;
pub mod lexer;
pub mod parser;
pub mod signals;
pub mod status;

pub use command::Command;
pub use config::Config;
pub use error::ShellError;
pub use external::CHILD_FAILURE;

/// Just a convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::{Interpreter, ShellState};
pub use signals::{Mode, SignalController};
pub use status::Status;
