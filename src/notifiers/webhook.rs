//! JSON posts to incoming webhooks

use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde::Serialize;
use tracing::info;
use url::Url;

use super::NotifyError;
use crate::polaris::{AttemptError, RetryPolicy};

/// Posts JSON payloads to one webhook URL with the shared retry policy.
#[derive(Debug, Clone)]
pub struct WebhookClient {
    client: Client,
    url: Url,
    retry: RetryPolicy,
}

impl WebhookClient {
    pub fn new(url: Url, retry: RetryPolicy) -> Self {
        Self {
            client: Client::new(),
            url,
            retry,
        }
    }

    /// Scheme and host only; webhook paths carry the secret.
    pub fn redacted_target(&self) -> String {
        let host = self.url.host_str().unwrap_or("unknown");
        format!("{}://{}", self.url.scheme(), host)
    }

    pub async fn post_json<T>(&self, payload: &T) -> Result<(), NotifyError>
    where
        T: Serialize + ?Sized,
    {
        let body = serde_json::to_vec(payload)?;
        let target = self.redacted_target();
        let client = &self.client;
        let url = &self.url;
        let body = &body;

        self.retry
            .run(&target, move || async move {
                let response = client
                    .post(url.clone())
                    .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                    .body(body.clone())
                    .send()
                    .await
                    .map_err(|err| AttemptError::transport(&err))?;
                let status = response.status();
                if status.is_success() {
                    Ok(())
                } else {
                    Err(AttemptError::new(Some(status), "webhook rejected the message"))
                }
            })
            .await
            .map_err(|exhausted| NotifyError::Delivery {
                target: target.clone(),
                attempts: exhausted.attempts,
                last: exhausted.last,
            })?;

        info!(webhook = %target, bytes = body.len(), "Delivered webhook message");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacted_target_drops_path_and_query() {
        let client = WebhookClient::new(
            Url::parse("https://hooks.slack.example/services/T0/B0/secret?x=1").unwrap(),
            RetryPolicy::default(),
        );
        assert_eq!(client.redacted_target(), "https://hooks.slack.example");
    }
}
