use crate::error::ShellError;
use crate::interpreter::ShellState;
use std::fmt;
use std::io::Write;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// Upper bound on the argument vector, program name included.
pub const MAX_ARGS: usize = 512;

/// One parsed command line.
///
/// Built by the parser once per input line and consumed by exactly one dispatch.
/// `argv` is never empty and `argv[0]` is the program name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    argv: Vec<String>,
    input: Option<String>,
    output: Option<String>,
    background: bool,
}

impl Command {
    pub(crate) fn new(
        argv: Vec<String>,
        input: Option<String>,
        output: Option<String>,
        background: bool,
    ) -> Self {
        debug_assert!(!argv.is_empty() && argv.len() <= MAX_ARGS);
        Self {
            argv,
            input,
            output,
            background,
        }
    }

    /// Name of the program, `argv[0]`.
    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    /// Arguments following the program name.
    pub fn args(&self) -> &[String] {
        &self.argv[1..]
    }

    /// Full argument vector including the program name.
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn input(&self) -> Option<&str> {
        self.input.as_deref()
    }

    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    pub fn is_background(&self) -> bool {
        self.background
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.argv.join(" "))?;
        if let Some(input) = &self.input {
            write!(f, " < {input}")?;
        }
        if let Some(output) = &self.output {
            write!(f, " > {output}")?;
        }
        if self.background {
            write!(f, " &")?;
        }
        Ok(())
    }
}

/// Object-safe trait for any command that can be executed by the shell.
///
/// This is implemented by built-ins via a blanket impl and by external commands.
pub trait ExecutableCommand {
    /// Executes the command against the shell state.
    ///
    /// User-visible notices go to `out`. Only unrecoverable conditions are
    /// returned as errors.
    fn execute(
        self: Box<Self>,
        shell: &mut ShellState,
        out: &mut dyn Write,
    ) -> Result<(), ShellError>;
}

/// Factory that tries to create a command from a parsed [`Command`].
///
/// Returns `None` when the factory doesn't recognize the program name.
pub trait CommandFactory {
    /// Attempt to create a command instance for the provided command line.
    fn try_create(&self, cmd: &Command) -> Option<Box<dyn ExecutableCommand>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_renders_the_line() {
        let cmd = Command::new(
            vec!["wc".to_string(), "-l".to_string()],
            Some("in".to_string()),
            Some("out".to_string()),
            true,
        );
        assert_eq!(cmd.to_string(), "wc -l < in > out &");
        assert_eq!(cmd.program(), "wc");
        assert_eq!(cmd.args(), &["-l".to_string()]);
    }
}
