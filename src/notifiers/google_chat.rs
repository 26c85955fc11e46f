//! Google Chat incoming-webhook notifier

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{info, instrument};
use url::Url;
use uuid::Uuid;

use super::webhook::WebhookClient;
use super::{Notifier, NotifyError};
use crate::models::issue::ALL_SEVERITIES;
use crate::models::{Filter, NormalizedIssue, ProjectSummary, Severity};
use crate::polaris::RetryPolicy;

const CARD_TITLE: &str = "Summary of polaris tickets";

pub struct GoogleChatNotifier {
    webhook: WebhookClient,
}

impl GoogleChatNotifier {
    pub fn new(url: Url, retry: RetryPolicy) -> Self {
        Self {
            webhook: WebhookClient::new(url, retry),
        }
    }
}

#[async_trait]
impl Notifier for GoogleChatNotifier {
    fn name(&self) -> &'static str {
        "google-chat"
    }

    fn needs_untriaged(&self) -> bool {
        true
    }

    #[instrument(skip_all, fields(webhook = %self.webhook.redacted_target()))]
    async fn publish(
        &self,
        summaries: &[ProjectSummary],
        _filter: &Filter,
    ) -> Result<(), NotifyError> {
        let card = summary_card(summaries, &Uuid::new_v4().to_string());
        self.webhook.post_json(&card).await?;
        info!(projects = summaries.len(), "Sent Google Chat digest");
        Ok(())
    }
}

/// Build the `cardsV2` payload for the digest.
pub fn summary_card(summaries: &[ProjectSummary], card_id: &str) -> Value {
    let total: usize = summaries.iter().map(|s| s.issues.len()).sum();
    let untriaged: usize = summaries.iter().map(|s| s.untriaged_issues.len()).sum();

    let sections: Vec<Value> = summaries.iter().map(project_section).collect();

    json!({
        "cardsV2": [{
            "cardId": card_id,
            "card": {
                "header": {
                    "title": CARD_TITLE,
                    "subtitle": format!(
                        "There are {total} issues in {} projects. {untriaged} issues need to be triaged",
                        summaries.len()
                    ),
                },
                "sections": sections,
            },
        }],
    })
}

fn project_section(summary: &ProjectSummary) -> Value {
    let mut widgets: Vec<Value> = Vec::new();
    let mut highest: Option<Severity> = None;
    let mut untriaged_total = 0;

    for &severity in ALL_SEVERITIES {
        let count = count_of(&summary.issues, severity);
        if count == 0 {
            continue;
        }
        let untriaged = count_of(&summary.untriaged_issues, severity);
        untriaged_total += untriaged;
        highest.get_or_insert(severity);

        let mut text = format!("{count} {severity} issues");
        if untriaged > 0 {
            text.push_str(&format!(" ({untriaged} not triaged)"));
        }
        widgets.push(json!({"decoratedText": {"text": text}}));
    }

    let mut buttons = vec![json!({
        "text": "Go to issues",
        "color": severity_color(highest.unwrap_or(Severity::Audit)),
        "onClick": {"openLink": {"url": summary.direct_link}},
    })];
    if untriaged_total > 0 {
        buttons.push(json!({
            "text": "Untriaged issues",
            "onClick": {"openLink": {"url": summary.direct_link_untriaged}},
        }));
    }
    widgets.push(json!({"buttonList": {"buttons": buttons}}));

    json!({
        "header": summary.project_name,
        "widgets": widgets,
    })
}

fn count_of(issues: &[NormalizedIssue], severity: Severity) -> usize {
    issues.iter().filter(|i| i.severity == severity).count()
}

fn severity_color(severity: Severity) -> Value {
    let (red, green, blue) = match severity {
        Severity::Critical | Severity::High => (0.86, 0.21, 0.27),
        Severity::Medium => (0.99, 0.49, 0.08),
        Severity::Low | Severity::Audit => (1.0, 0.76, 0.03),
    };
    json!({"red": red, "green": green, "blue": blue, "alpha": 1})
}
