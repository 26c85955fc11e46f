//! # Digest delivery
//!
//! A [`Notifier`] renders project summaries and delivers them. Slack and
//! Google Chat post to incoming webhooks; the console notifier prints JSON.

pub mod console;
pub mod google_chat;
pub mod slack;
pub mod webhook;

#[cfg(test)]
pub(crate) mod test_support;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::NotifyConfig;
use crate::models::{Filter, ProjectSummary};
use crate::polaris::{AttemptError, RetryPolicy};

pub use console::ConsoleNotifier;
pub use google_chat::GoogleChatNotifier;
pub use slack::{BlockBuffer, SlackNotifier};
pub use webhook::WebhookClient;

/// Errors that can occur while delivering a digest.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("webhook delivery to {target} failed after {attempts} attempts ({last})")]
    Delivery {
        target: String,
        attempts: u32,
        last: AttemptError,
    },
    #[error("failed to serialize digest: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write digest: {0}")]
    Io(#[from] std::io::Error),
}

/// Rendering and delivery backend for a digest.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether summaries must carry `untriaged-issues` before publishing.
    fn needs_untriaged(&self) -> bool {
        false
    }

    async fn publish(&self, summaries: &[ProjectSummary], filter: &Filter)
    -> Result<(), NotifyError>;
}

/// Pick the notifier for this run. Slack wins over Google Chat; with no
/// webhook configured, or on a dry run, the digest goes to the console.
pub fn select(config: &NotifyConfig, retry: RetryPolicy, dry_run: bool) -> Box<dyn Notifier> {
    if dry_run {
        info!("Dry run requested; printing the digest to the console");
        return Box::new(ConsoleNotifier);
    }

    match (&config.slack, &config.google_spaces_url) {
        (Some(slack), google) => {
            if google.is_some() {
                warn!("Both SLACK_WEBHOOK_URL and GOOGLE_SPACES_URL are set; using Slack");
            }
            Box::new(SlackNotifier::new(slack.clone(), retry))
        }
        (None, Some(url)) => Box::new(GoogleChatNotifier::new(url.clone(), retry)),
        (None, None) => {
            warn!("No webhook configured; printing the digest to the console");
            Box::new(ConsoleNotifier)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SlackConfig;
    use url::Url;

    fn slack() -> SlackConfig {
        SlackConfig {
            webhook_url: Url::parse("https://hooks.slack.example/services/X").unwrap(),
            one_message_per_project: false,
            send_untriaged_too: false,
            list_all_issues: false,
        }
    }

    #[test]
    fn slack_takes_precedence_over_google() {
        let config = NotifyConfig {
            slack: Some(slack()),
            google_spaces_url: Some(Url::parse("https://chat.googleapis.example/v1/spaces/X").unwrap()),
        };
        assert_eq!(select(&config, RetryPolicy::default(), false).name(), "slack");
    }

    #[test]
    fn google_is_used_alone() {
        let config = NotifyConfig {
            slack: None,
            google_spaces_url: Some(Url::parse("https://chat.googleapis.example/v1/spaces/X").unwrap()),
        };
        let notifier = select(&config, RetryPolicy::default(), false);
        assert_eq!(notifier.name(), "google-chat");
        assert!(notifier.needs_untriaged());
    }

    #[test]
    fn dry_run_and_missing_webhooks_use_console() {
        let config = NotifyConfig {
            slack: Some(slack()),
            google_spaces_url: None,
        };
        assert_eq!(select(&config, RetryPolicy::default(), true).name(), "console");
        assert_eq!(
            select(&NotifyConfig::default(), RetryPolicy::default(), false).name(),
            "console"
        );
    }
}
