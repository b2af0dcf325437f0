use argh::FromArgs;

/// Prompt shown before every command.
pub const DEFAULT_PROMPT: &str = ": ";

/// Environment variable holding a `tracing` filter directive.
pub const LOG_ENV: &str = "JOBSH_LOG";

#[derive(FromArgs, Debug)]
/// An interactive shell with background jobs and a foreground-only mode (toggled with Ctrl-Z).
pub struct Args {
    #[argh(option, default = "String::from(DEFAULT_PROMPT)")]
    /// text printed before reading each command.
    pub prompt: String,

    #[argh(switch)]
    /// do not keep a line-editing history.
    pub no_history: bool,

    #[argh(switch, short = 'v')]
    /// log shell internals (spawns, reaps, mode changes) to stderr.
    pub verbose: bool,

    #[argh(option)]
    /// log filter, e.g. `debug` or `jobsh=trace`; overrides --verbose.
    pub log: Option<String>,
}

/// Runtime settings of the interactive loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub prompt: String,
    pub history: bool,
    /// Fallback log filter when `JOBSH_LOG` is unset.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            history: true,
            log_filter: "warn".to_string(),
        }
    }
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        let log_filter = match (args.log, args.verbose) {
            (Some(filter), _) => filter,
            (None, true) => "debug".to_string(),
            (None, false) => "warn".to_string(),
        };
        Self {
            prompt: args.prompt,
            history: !args.no_history,
            log_filter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(args: &[&str]) -> Config {
        Config::from(Args::from_args(&["jobsh"], args).unwrap())
    }

    #[test]
    fn test_defaults_match_default_config() {
        assert_eq!(config(&[]), Config::default());
    }

    #[test]
    fn test_flags() {
        let config = config(&["--prompt", "$ ", "--no-history", "-v"]);
        assert_eq!(config.prompt, "$ ");
        assert!(!config.history);
        assert_eq!(config.log_filter, "debug");
    }

    #[test]
    fn test_explicit_log_filter_wins() {
        assert_eq!(config(&["-v", "--log", "trace"]).log_filter, "trace");
    }

    #[test]
    fn test_unknown_flag_is_rejected() {
        assert!(Args::from_args(&["jobsh"], &["--bogus"]).is_err());
    }
}
