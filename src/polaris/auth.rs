//! Access token to bearer token exchange

use std::sync::Arc;

use reqwest::header::HeaderValue;
use tokio::sync::Semaphore;
use tracing::{info, instrument};

use super::error::{AttemptError, AuthError};
use super::links::LinkBuilder;
use super::models::AuthResponse;
use super::{PolarisClient, retry};
use crate::config::PolarisConfig;

const AUTHENTICATE_PATH: &str = "/api/auth/authenticate";

impl PolarisClient {
    /// Exchange the configured API token for a JWT and build a client that
    /// sends it on every request. Called once per run.
    #[instrument(skip_all, fields(base_url = %config.base_url))]
    pub async fn authenticate(config: &PolarisConfig) -> Result<Self, AuthError> {
        let http = reqwest::Client::new();
        let links = LinkBuilder::new(config.base_url.clone());
        let retry = config.retry;

        let url = links.join(AUTHENTICATE_PATH).map_err(|err| AuthError {
            attempts: 0,
            last: AttemptError::new(None, err.to_string()),
        })?;

        let client = &http;
        let bearer = retry
            .run("authenticate", move || {
                let url = url.clone();
                async move {
                    let response = client
                        .post(url)
                        .form(&[("accesstoken", config.token.as_str())])
                        .send()
                        .await
                        .map_err(|err| AttemptError::transport(&err))?;
                    if response.status() != reqwest::StatusCode::OK {
                        return Err(AttemptError::new(
                            Some(response.status()),
                            "authentication rejected",
                        ));
                    }
                    let status = response.status();
                    let body = retry::read_json::<AuthResponse>(response).await?;
                    bearer_header(&body.jwt).ok_or_else(|| {
                        AttemptError::new(Some(status), "jwt is not a valid header value")
                    })
                }
            })
            .await
            .map_err(|exhausted| AuthError {
                attempts: exhausted.attempts,
                last: exhausted.last,
            })?;

        info!("Authenticated with Polaris");

        Ok(Self {
            http,
            links,
            bearer,
            retry,
            limiter: Arc::new(Semaphore::new(config.max_concurrency)),
            config: Arc::new(config.clone()),
        })
    }
}

fn bearer_header(jwt: &str) -> Option<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {jwt}")).ok()?;
    value.set_sensitive(true);
    Some(value)
}
