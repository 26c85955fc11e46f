//! # Error Handling
//!
//! Top-level error for a digest run. Every component error converts into
//! [`AppError`]; the binary logs it once and exits non-zero.

use std::process::ExitCode;

use thiserror::Error;

use crate::config::ConfigError;
use crate::normalization::NormalizationError;
use crate::notifiers::NotifyError;
use crate::polaris::{AuthError, FetchError};
use crate::telemetry::TelemetryInitError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Telemetry(#[from] TelemetryInitError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Normalization(#[from] NormalizationError),
    #[error(transparent)]
    Notify(#[from] NotifyError),
    #[error("project task did not complete: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl AppError {
    /// Stable code for structured logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "CONFIG",
            AppError::Telemetry(_) => "TELEMETRY",
            AppError::Auth(_) => "AUTH",
            AppError::Fetch(_) => "FETCH",
            AppError::Normalization(NormalizationError::UnknownSeverity { .. }) => "LOOKUP",
            AppError::Normalization(_) => "NORMALIZATION",
            AppError::Notify(_) => "NOTIFY",
            AppError::Task(_) => "TASK",
        }
    }

    /// Every fatal condition exits with 1.
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_follow_the_source() {
        let err = AppError::from(ConfigError::MissingPolarisToken);
        assert_eq!(err.error_code(), "CONFIG");
        assert!(err.to_string().contains("POLARIS_TOKEN"));

        let err = AppError::from(NormalizationError::UnknownSeverity {
            issue_id: "i-1".into(),
            severity: "Info".into(),
        });
        assert_eq!(err.error_code(), "LOOKUP");
    }
}
