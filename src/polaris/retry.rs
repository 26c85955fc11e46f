//! Bounded retry for Polaris and webhook requests

use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{error, warn};

use super::error::AttemptError;

/// Number of attempts and the fixed pause between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetryPolicy {
    /// Total attempts per request; validated to be at least 1
    pub retries: u32,
    pub wait_seconds: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 1,
            wait_seconds: 60,
        }
    }
}

/// Retries ran out; carries the last failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exhausted {
    pub attempts: u32,
    pub last: AttemptError,
}

impl RetryPolicy {
    pub fn wait(&self) -> Duration {
        Duration::from_secs(self.wait_seconds)
    }

    pub fn attempts(&self) -> u32 {
        self.retries.max(1)
    }

    /// Run `attempt` until it succeeds or the attempts are used up, sleeping
    /// between failures but never after the last one.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut attempt: F) -> Result<T, Exhausted>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AttemptError>>,
    {
        let attempts = self.attempts();
        let mut tried = 0;

        loop {
            tried += 1;
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(last) if tried >= attempts => {
                    error!(
                        operation,
                        attempts,
                        error = %last,
                        "Giving up after exhausting retries"
                    );
                    return Err(Exhausted { attempts, last });
                }
                Err(err) => {
                    warn!(
                        operation,
                        attempt = tried,
                        wait_seconds = self.wait_seconds,
                        error = %err,
                        "Request failed, retrying"
                    );
                    tokio::time::sleep(self.wait()).await;
                }
            }
        }
    }
}

/// Turn a response into `T`, treating non-2xx statuses and undecodable
/// bodies alike as a failed attempt.
pub async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, AttemptError> {
    let status = response.status();
    if !status.is_success() {
        return Err(AttemptError::new(Some(status), "unexpected status"));
    }
    response
        .json::<T>()
        .await
        .map_err(|err| AttemptError::new(Some(status), format!("unexpected payload: {err}")))
}
