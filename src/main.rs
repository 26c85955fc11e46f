//! # Polaris Digest Entry Point
//!
//! Loads configuration, runs one digest and exits.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, error};

use polaris_digest::config::{ConfigLoader, LogConfig};
use polaris_digest::digest::run_digest;
use polaris_digest::error::AppError;
use polaris_digest::notifiers;
use polaris_digest::telemetry::init_tracing;

#[derive(Debug, Parser)]
#[command(name = "polaris-digest", version, about)]
struct Cli {
    /// Print the digest to stdout instead of posting it to a webhook
    #[arg(long)]
    dry_run: bool,

    /// Directory holding the `.env` and `.env.local` files
    #[arg(long, value_name = "DIR")]
    env_dir: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            // --help and --version are not failures
            return if err.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(code = err.error_code(), error = %err, "Polaris digest failed");
            eprintln!("error: {err}");
            err.exit_code()
        }
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let loader = match cli.env_dir {
        Some(dir) => ConfigLoader::with_base_dir(dir),
        None => ConfigLoader::new(),
    };

    let config = match loader.load() {
        Ok(config) => config,
        Err(err) => {
            // Still log the failure in the default format.
            let _ = init_tracing(&LogConfig::default());
            return Err(err.into());
        }
    };
    init_tracing(&config.log)?;

    if let Ok(redacted_json) = config.redacted_json() {
        debug!(config = %redacted_json, "Loaded configuration");
    }

    let notifier = notifiers::select(&config.notify, config.polaris.retry, cli.dry_run);
    run_digest(&config, notifier.as_ref()).await?;
    Ok(())
}
