use crate::command::{Command, CommandFactory};
use crate::config::Config;
use crate::env::Environment;
use crate::error::ShellError;
use crate::external::ExternalCommand;
use crate::jobs::ProcessTable;
use crate::lexer;
use crate::parser::{self, Parsed};
use crate::signals::SignalController;
use crate::status::StatusTracker;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{self, Write};
use tracing::{debug, info, warn};

/// Factory allows creating instances of ExecutableCommand.
///
/// Only supports the built-ins defined in this crate.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// Everything a command may read or change while it runs.
///
/// Owned by the read-evaluate loop and lent to one command at a time.
#[derive(Debug, Default)]
pub struct ShellState {
    pub env: Environment,
    pub jobs: ProcessTable,
    pub status: StatusTracker,
}

impl ShellState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// An interactive shell: reads a line, runs it, repeats.
///
/// Built-ins are created by a list of [`CommandFactory`] objects queried in
/// order; see [`Interpreter::new`] for the defaults. A command no factory
/// accepts is run as an external program.
///
/// Example
/// ```
/// use jobsh::{Config, Interpreter, SignalController};
/// let mut sh = Interpreter::new(Config::default(), SignalController::new());
/// let mut out = Vec::new();
/// sh.eval_line("status", &mut out).unwrap();
/// assert_eq!(out, b"exit value 0\n");
/// ```
pub struct Interpreter {
    state: ShellState,
    signals: SignalController,
    config: Config,
    commands: Vec<Box<dyn CommandFactory>>,
}

impl Interpreter {
    /// Create an interpreter with the built-ins `exit`, `cd` and `status`.
    pub fn new(config: Config, signals: SignalController) -> Self {
        use crate::builtin::*;
        Self::with_commands(
            config,
            signals,
            vec![
                Box::new(Factory::<Exit>::default()),
                Box::new(Factory::<Cd>::default()),
                Box::new(Factory::<StatusCmd>::default()),
            ],
        )
    }

    /// Create an interpreter with a custom set of built-in factories.
    pub fn with_commands(
        config: Config,
        signals: SignalController,
        commands: Vec<Box<dyn CommandFactory>>,
    ) -> Self {
        Self {
            state: ShellState::new(),
            signals,
            config,
            commands,
        }
    }

    pub fn state(&self) -> &ShellState {
        &self.state
    }

    pub fn signals(&self) -> &SignalController {
        &self.signals
    }

    pub fn should_exit(&self) -> bool {
        self.state.env.should_exit()
    }

    /// Work done before every prompt: announce mode changes, then one
    /// non-blocking reap so finished jobs are reported before new input.
    pub fn before_prompt(&mut self, out: &mut dyn Write) -> Result<(), ShellError> {
        for mode in self.signals.poll_notices() {
            writeln!(out, "{}", mode.notice())?;
        }
        self.state.jobs.reap_one(&mut self.state.status, out)?;
        out.flush()?;
        Ok(())
    }

    /// Lexes, parses and runs one input line.
    ///
    /// Syntax errors print one line and leave all state untouched.
    pub fn eval_line(&mut self, line: &str, out: &mut dyn Write) -> Result<(), ShellError> {
        let mode = self.signals.mode();
        let parsed = lexer::split_into_tokens(line)
            .map_err(|e| e.to_string())
            .and_then(|tokens| parser::parse(tokens, mode).map_err(|e| e.to_string()));
        match parsed {
            Ok(Parsed::Command(cmd)) => self.dispatch(&cmd, out),
            Ok(Parsed::Nothing) => Ok(()),
            Err(message) => {
                debug!(line, %message, "rejected input");
                writeln!(out, "{message}")?;
                out.flush()?;
                Ok(())
            }
        }
    }

    /// Routes `cmd` to the first factory that accepts it, or to the OS.
    pub fn dispatch(&mut self, cmd: &Command, out: &mut dyn Write) -> Result<(), ShellError> {
        debug!(command = %cmd, "dispatching");
        let executable = self
            .commands
            .iter()
            .find_map(|factory| factory.try_create(cmd))
            .unwrap_or_else(|| Box::new(ExternalCommand::new(cmd.clone())));
        executable.execute(&mut self.state, out)
    }

    /// Terminates every tracked job and marks the loop finished.
    pub fn shutdown(&mut self) {
        info!(jobs = self.state.jobs.len(), "shutting down");
        self.state.jobs.kill_all();
        self.state.env.request_exit();
    }

    /// Read-Eval-Print Loop on the terminal.
    ///
    /// Returns when `exit` runs or input ends. Only fatal errors are returned.
    pub fn repl(&mut self) -> Result<(), ShellError> {
        let mut rl = DefaultEditor::new()?;
        let mut stdout = io::stdout();

        while !self.should_exit() {
            if let Err(e) = self.before_prompt(&mut stdout) {
                warn!(error = %e, "failed to report background jobs");
            }

            match rl.readline(&self.config.prompt) {
                Ok(line) => {
                    if self.config.history && !line.trim().is_empty() {
                        rl.add_history_entry(line.as_str())?;
                    }
                    match self.eval_line(&line, &mut stdout) {
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => warn!(error = %e, "command output failed"),
                        Ok(()) => {}
                    }
                }
                // Ctrl-C at the prompt only discards the line.
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => self.shutdown(),
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }
}
