//! Error types for Polaris API calls

use std::fmt;

use reqwest::StatusCode;
use thiserror::Error;

/// One failed HTTP attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptError {
    /// Status of the response, absent when the request never got one
    pub status: Option<StatusCode>,
    pub reason: String,
}

impl AttemptError {
    pub fn new(status: Option<StatusCode>, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
        }
    }

    pub fn transport(err: &reqwest::Error) -> Self {
        Self::new(err.status(), err.to_string())
    }
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {}: {}", status.as_u16(), self.reason),
            None => write!(f, "HTTP N/A: {}", self.reason),
        }
    }
}

impl std::error::Error for AttemptError {}

/// Bearer token exchange exhausted its retries.
#[derive(Debug, Error)]
#[error("failed to authenticate with Polaris after {attempts} attempts ({last})")]
pub struct AuthError {
    pub attempts: u32,
    pub last: AttemptError,
}

/// A project listing or issue page could not be fetched.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("unexpected response from Polaris for {resource} after {attempts} attempts ({last})")]
    Exhausted {
        resource: String,
        attempts: u32,
        last: AttemptError,
    },

    #[error("fetch task for {resource} did not complete: {source}")]
    Task {
        resource: String,
        #[source]
        source: tokio::task::JoinError,
    },

    #[error("invalid Polaris URL for {resource}: {source}")]
    Url {
        resource: String,
        #[source]
        source: url::ParseError,
    },
}

impl FetchError {
    /// Status of the last response received before giving up.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            FetchError::Exhausted { last, .. } => last.status,
            _ => None,
        }
    }
}
