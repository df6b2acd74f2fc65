//! CLI entry point for aparts.

use std::process::ExitCode;

use anyhow::Result;
use aparts_core::ConfigError;
use clap::Parser;
use tracing::debug;

mod cli;
mod commands;

use cli::{Cli, Command, ConfigAction};

/// Process outcome, mapped to the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// Everything succeeded.
    Success,
    /// Some documents failed or the run was interrupted.
    Failure,
    /// The configuration was rejected before any work started.
    Configuration,
}

impl From<ProcessExit> for ExitCode {
    fn from(exit: ProcessExit) -> Self {
        match exit {
            ProcessExit::Success => ExitCode::SUCCESS,
            ProcessExit::Failure => ExitCode::from(1),
            ProcessExit::Configuration => ExitCode::from(2),
        }
    }
}

/// Maps an error escaping a command to its exit outcome.
fn exit_for_error(error: &anyhow::Error) -> ProcessExit {
    if error.downcast_ref::<ConfigError>().is_some() {
        ProcessExit::Configuration
    } else {
        ProcessExit::Failure
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}

async fn run(cli: Cli) -> Result<ProcessExit> {
    let config_path = cli.config.as_deref();
    match &cli.command {
        Command::Vocab(args) => {
            commands::run_vocab_command(args, config_path).await?;
            Ok(ProcessExit::Success)
        }
        Command::Tag(args) => commands::run_tag_command(args, config_path, cli.quiet).await,
        Command::Config {
            action: ConfigAction::Show,
        } => {
            commands::run_config_show_command(config_path)?;
            Ok(ProcessExit::Success)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);
    debug!(?cli, "CLI arguments parsed");

    match run(cli).await {
        Ok(exit) => exit.into(),
        Err(error) => {
            eprintln!("Error: {error:#}");
            exit_for_error(&error).into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_config_errors_map_to_configuration_exit() {
        let error = anyhow::Error::new(ConfigError::Missing {
            path: PathBuf::from("aparts.toml"),
        });
        assert_eq!(exit_for_error(&error), ProcessExit::Configuration);

        let wrapped = error.context("while loading settings");
        assert_eq!(exit_for_error(&wrapped), ProcessExit::Configuration);
    }

    #[test]
    fn test_other_errors_map_to_failure_exit() {
        let error = anyhow::anyhow!("disk full");
        assert_eq!(exit_for_error(&error), ProcessExit::Failure);
    }
}
