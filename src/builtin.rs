use crate::command::{Command, CommandFactory, ExecutableCommand};
use crate::error::ShellError;
use crate::interpreter::{Factory, ShellState};
use anyhow::{Context, Result, anyhow, bail};
use argh::{EarlyExit, FromArgs};
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process. Redirections and the background
/// marker do not apply to them, and they never change the last status.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "cd" or "status".
    fn name() -> &'static str;

    /// Executes the command. An error is printed as a single diagnostic line.
    fn execute(self, out: &mut dyn Write, shell: &mut ShellState) -> Result<()>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(
        self: Box<Self>,
        shell: &mut ShellState,
        out: &mut dyn Write,
    ) -> Result<(), ShellError> {
        if let Err(e) = <T as BuiltinCommand>::execute(*self, out, shell) {
            debug!(builtin = T::name(), error = %e, "builtin failed");
            writeln!(out, "{e:#}")?;
        }
        out.flush()?;
        Ok(())
    }
}

struct InvalidArgs {
    output: String,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(
        self: Box<Self>,
        _shell: &mut ShellState,
        out: &mut dyn Write,
    ) -> Result<(), ShellError> {
        writeln!(out, "{}", self.output.trim_end())?;
        out.flush()?;
        Ok(())
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(&self, cmd: &Command) -> Option<Box<dyn ExecutableCommand>> {
        if cmd.program() != T::name() {
            return None;
        }
        let args: Vec<&str> = cmd.args().iter().map(String::as_str).collect();
        Some(match T::from_args(&[T::name()], &args) {
            Ok(builtin) => Box::new(builtin),
            Err(EarlyExit { output, .. }) => Box::new(InvalidArgs { output }),
        })
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to the directory specified by the HOME environment variable.
pub struct Cd {
    #[argh(positional, greedy)]
    /// directory to switch to; absolute or relative to the current directory. Defaults to $HOME when omitted.
    pub targets: Vec<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(self, _out: &mut dyn Write, shell: &mut ShellState) -> Result<()> {
        let target = match self.targets.as_slice() {
            [target] if !target.is_empty() => PathBuf::from(target),
            [] | [_] => {
                let home = shell.env.home().ok_or_else(|| anyhow!("cd: HOME not set"))?;
                PathBuf::from(home)
            }
            _ => bail!("cd: too many arguments"),
        };

        let entered = shell
            .env
            .change_dir(&target)
            .with_context(|| format!("cd: {}", target.display()))?;
        debug!(dir = %entered.display(), "changed directory");
        Ok(())
    }
}

#[derive(FromArgs)]
/// Exit the shell, terminating every background job first.
pub struct Exit {
    #[argh(positional, greedy)]
    /// ignored.
    pub _args: Vec<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(self, _out: &mut dyn Write, shell: &mut ShellState) -> Result<()> {
        debug!(jobs = shell.jobs.len(), "exit requested");
        shell.jobs.kill_all();
        shell.env.request_exit();
        Ok(())
    }
}

#[derive(FromArgs)]
/// Print the exit value or terminating signal of the last process.
pub struct StatusCmd {
    #[argh(positional, greedy)]
    /// ignored.
    pub _args: Vec<String>,
}

impl BuiltinCommand for StatusCmd {
    fn name() -> &'static str {
        "status"
    }

    fn execute(self, out: &mut dyn Write, shell: &mut ShellState) -> Result<()> {
        writeln!(out, "{}", shell.status.render())?;
        Ok(())
    }
}
