//! Polaris API client
//!
//! Provides the pieces of the fetch pipeline:
//! - bearer token exchange ([`PolarisClient::authenticate`])
//! - project inventory with main branches and runs ([`PolarisClient::list_projects`])
//! - concurrent, paginated issue fetching ([`PolarisClient::fetch_issues`])
//!
//! Every request goes through the shared [`RetryPolicy`] and holds a permit
//! of the request limiter while it is in flight.

pub mod auth;
pub mod error;
pub mod issues;
pub mod links;
pub mod models;
pub mod projects;
pub mod retry;

use std::sync::Arc;

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use tokio::sync::{Semaphore, SemaphorePermit};

use crate::config::PolarisConfig;

pub use error::{AttemptError, AuthError, FetchError};
pub use links::LinkBuilder;
pub use models::{IssueBatch, ProjectListing, Resource, ResourceRef, Run, RunPool};
pub use projects::Inventory;
pub use retry::RetryPolicy;

const JSON_API: &str = "application/vnd.api+json";

/// Authenticated Polaris client. Cheap to clone; clones share the HTTP
/// connection pool and the request limiter.
#[derive(Clone)]
pub struct PolarisClient {
    http: reqwest::Client,
    links: LinkBuilder,
    bearer: HeaderValue,
    retry: RetryPolicy,
    limiter: Arc<Semaphore>,
    config: Arc<PolarisConfig>,
}

impl PolarisClient {
    pub fn links(&self) -> &LinkBuilder {
        &self.links
    }

    pub(crate) fn config(&self) -> &PolarisConfig {
        &self.config
    }

    fn api_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_API));
        headers.insert(ACCEPT, HeaderValue::from_static(JSON_API));
        headers.insert(AUTHORIZATION, self.bearer.clone());
        headers
    }

    /// Wait for a free request slot.
    async fn permit(&self) -> Result<SemaphorePermit<'_>, AttemptError> {
        self.limiter
            .acquire()
            .await
            .map_err(|_| AttemptError::new(None, "request limiter closed"))
    }

    /// GET `url` and decode the body as `T`, with retries.
    async fn get_json<T>(&self, resource: &str, url: url::Url) -> Result<T, FetchError>
    where
        T: serde::de::DeserializeOwned,
    {
        self.retry
            .run(resource, move || {
                let url = url.clone();
                async move {
                    let _permit = self.permit().await?;
                    let response = self
                        .http
                        .get(url)
                        .headers(self.api_headers())
                        .send()
                        .await
                        .map_err(|err| AttemptError::transport(&err))?;
                    retry::read_json::<T>(response).await
                }
            })
            .await
            .map_err(|exhausted| FetchError::Exhausted {
                resource: resource.to_string(),
                attempts: exhausted.attempts,
                last: exhausted.last,
            })
    }
}
