//! Global subscriber management for structured logs.

use std::sync::atomic::{AtomicBool, Ordering};

use log::LevelFilter;
use thiserror::Error;
use tracing_log::LogTracer;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::{EnvFilter, fmt, layer::Layer, layer::SubscriberExt};

use crate::config::LogConfig;

/// Errors that can occur while initializing global telemetry.
#[derive(Debug, Error)]
pub enum TelemetryInitError {
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(#[from] SetGlobalDefaultError),
}

static TELEMETRY_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize global tracing exactly once, wiring `log::` macros into the
/// tracing pipeline. Output goes to stderr; stdout belongs to the console
/// notifier.
pub fn init_tracing(config: &LogConfig) -> Result<(), TelemetryInitError> {
    if TELEMETRY_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Ok(());
    }

    // A `log` logger may already be installed; `log::` records then bypass tracing.
    if let Err(err) = LogTracer::builder()
        .with_max_level(LevelFilter::Trace)
        .init()
    {
        eprintln!("Warning: failed to install log tracer bridge: {err}");
    }

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let fmt_layer = match config.format.as_str() {
        "pretty" => fmt::layer().pretty().with_writer(std::io::stderr).boxed(),
        _ => fmt::layer().json().with_writer(std::io::stderr).boxed(),
    };

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);
    // `try_init` would install a second LogTracer and fail.
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        TELEMETRY_INITIALIZED.store(false, Ordering::SeqCst);
        return Err(err.into());
    }

    Ok(())
}
