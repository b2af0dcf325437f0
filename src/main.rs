use anyhow::Context;
use jobsh::config::{Args, LOG_ENV};
use jobsh::{Config, Interpreter, SignalController};
use std::io;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let args: Args = argh::from_env();
    let config = Config::from(args);
    init_tracing(&config);

    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("jobsh: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(config: Config) -> anyhow::Result<()> {
    let signals = SignalController::install().context("failed to install signal handlers")?;
    let mut shell = Interpreter::new(config, signals);
    shell.repl()?;
    Ok(())
}
