//! Slack incoming-webhook notifier
//!
//! Messages are built from Block Kit blocks collected in a [`BlockBuffer`],
//! which splits them into batches Slack accepts in one delivery.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{info, instrument};

use super::webhook::WebhookClient;
use super::{Notifier, NotifyError};
use crate::config::SlackConfig;
use crate::models::issue::ALL_SEVERITIES;
use crate::models::{Filter, NormalizedIssue, ProjectSummary, Severity};
use crate::polaris::RetryPolicy;

/// Slack rejects messages with more blocks than this.
pub const MAX_BLOCKS_PER_MESSAGE: usize = 50;

const FALLBACK_TEXT: &str = "Polaris issue digest";

/// Bounded block accumulator.
///
/// Pushing into a full batch closes it first, so no batch ever exceeds the
/// capacity. [`BlockBuffer::into_messages`] closes the pending batch.
#[derive(Debug)]
pub struct BlockBuffer {
    capacity: usize,
    pending: Vec<Value>,
    messages: Vec<Vec<Value>>,
}

impl Default for BlockBuffer {
    fn default() -> Self {
        Self::with_capacity(MAX_BLOCKS_PER_MESSAGE)
    }
}

impl BlockBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            pending: Vec::new(),
            messages: Vec::new(),
        }
    }

    pub fn push(&mut self, block: Value) {
        if self.pending.len() >= self.capacity {
            self.flush();
        }
        self.pending.push(block);
    }

    /// Close the pending batch. A no-op when nothing is pending.
    pub fn flush(&mut self) {
        if !self.pending.is_empty() {
            self.messages.push(std::mem::take(&mut self.pending));
        }
    }

    pub fn into_messages(mut self) -> Vec<Vec<Value>> {
        self.flush();
        self.messages
    }
}

/// One project as it appears in a summary.
struct ProjectView<'a> {
    name: &'a str,
    link: &'a str,
    issues: &'a [NormalizedIssue],
}

pub struct SlackNotifier {
    webhook: WebhookClient,
    config: SlackConfig,
}

impl SlackNotifier {
    pub fn new(config: SlackConfig, retry: RetryPolicy) -> Self {
        Self {
            webhook: WebhookClient::new(config.webhook_url.clone(), retry),
            config,
        }
    }

    /// Render every message of the digest, in delivery order.
    pub fn render(&self, summaries: &[ProjectSummary], filter: &Filter) -> Vec<Vec<Value>> {
        let mut buffer = BlockBuffer::default();
        let per_project = self.config.one_message_per_project;

        let everything: Vec<ProjectView<'_>> = summaries
            .iter()
            .map(|summary| ProjectView {
                name: &summary.project_name,
                link: &summary.direct_link,
                issues: &summary.issues,
            })
            .collect();

        if self.config.list_all_issues {
            render_listing(&mut buffer, &everything, per_project);
        } else {
            render_summary(&mut buffer, &everything, filter, per_project);
        }

        if self.config.send_untriaged_too {
            let untriaged: Vec<ProjectView<'_>> = summaries
                .iter()
                .filter(|summary| !summary.untriaged_issues.is_empty())
                .map(|summary| ProjectView {
                    name: &summary.project_name,
                    link: &summary.direct_link_untriaged,
                    issues: &summary.untriaged_issues,
                })
                .collect();
            buffer.flush();
            render_summary(&mut buffer, &untriaged, &filter.untriaged(), per_project);
        }

        buffer.into_messages()
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    fn name(&self) -> &'static str {
        "slack"
    }

    fn needs_untriaged(&self) -> bool {
        self.config.send_untriaged_too
    }

    #[instrument(skip_all, fields(webhook = %self.webhook.redacted_target()))]
    async fn publish(
        &self,
        summaries: &[ProjectSummary],
        filter: &Filter,
    ) -> Result<(), NotifyError> {
        let messages = self.render(summaries, filter);
        let count = messages.len();

        for blocks in messages {
            self.webhook
                .post_json(&json!({ "text": FALLBACK_TEXT, "blocks": blocks }))
                .await?;
        }

        info!(messages = count, projects = summaries.len(), "Sent Slack digest");
        Ok(())
    }
}

fn render_summary(
    buffer: &mut BlockBuffer,
    projects: &[ProjectView<'_>],
    filter: &Filter,
    per_project: bool,
) {
    let total: usize = projects.iter().map(|p| p.issues.len()).sum();
    buffer.push(mrkdwn_section(&summary_text(total, filter, projects.len())));

    for project in projects {
        let fields: Vec<Value> = severity_counts(project.issues)
            .into_iter()
            .map(|(severity, count)| {
                json!({
                    "type": "mrkdwn",
                    "text": format!("{}{severity}: {count}", severity_emoji(severity)),
                })
            })
            .collect();

        let mut block = mrkdwn_section(&format!(
            "*<{}|{}>*",
            project.link,
            escape(project.name)
        ));
        if !fields.is_empty() {
            block["fields"] = Value::Array(fields);
        }
        buffer.push(block);

        if per_project {
            buffer.flush();
        }
    }
}

/// Full listing: per project a header, then issues grouped under severity
/// and sub-tool headings.
fn render_listing(buffer: &mut BlockBuffer, projects: &[ProjectView<'_>], per_project: bool) {
    let total: usize = projects.iter().map(|p| p.issues.len()).sum();
    buffer.push(mrkdwn_section(&format!(
        "{total} issues in {} polaris projects",
        projects.len()
    )));

    for project in projects {
        buffer.push(json!({
            "type": "header",
            "text": {"type": "plain_text", "text": project.name},
        }));
        buffer.push(mrkdwn_section(&format!("{} issues", project.issues.len())));

        let mut last_severity: Option<Severity> = None;
        let mut last_sub_tool: Option<&str> = None;
        for issue in project.issues {
            if last_severity != Some(issue.severity) {
                buffer.push(json!({
                    "type": "section",
                    "text": {"type": "plain_text", "text": format!("Severity: {}", issue.severity)},
                }));
                buffer.push(json!({"type": "divider"}));
                last_severity = Some(issue.severity);
                last_sub_tool = None;
            }
            if last_sub_tool != Some(issue.sub_tool.as_str()) {
                buffer.push(mrkdwn_section(&format!("_{}_", escape(&issue.sub_tool))));
                buffer.push(json!({"type": "divider"}));
                last_sub_tool = Some(issue.sub_tool.as_str());
            }
            buffer.push(mrkdwn_section(&format!(
                "<{}|{}>",
                issue.direct_link,
                escape(&issue.path.to_string())
            )));
        }

        if per_project {
            buffer.flush();
        }
    }
}

fn summary_text(total: usize, filter: &Filter, projects: usize) -> String {
    let mut words = vec![total.to_string()];
    words.extend(filter.descriptions().into_iter().map(str::to_string));
    words.push("issues".to_string());
    format!("{} in {projects} polaris projects", words.join(" "))
}

/// Issue counts per severity, in severity order, skipping empty groups.
fn severity_counts(issues: &[NormalizedIssue]) -> Vec<(Severity, usize)> {
    ALL_SEVERITIES
        .iter()
        .map(|&severity| {
            let count = issues.iter().filter(|i| i.severity == severity).count();
            (severity, count)
        })
        .filter(|(_, count)| *count > 0)
        .collect()
}

fn severity_emoji(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => ":red_circle:",
        Severity::High => ":large_red_square:",
        Severity::Medium => ":large_orange_square:",
        Severity::Low => ":large_yellow_square:",
        Severity::Audit => ":large_white_square:",
    }
}

fn mrkdwn_section(text: &str) -> Value {
    json!({
        "type": "section",
        "text": {"type": "mrkdwn", "text": text},
    })
}

/// Escape the characters Slack treats as control sequences in mrkdwn.
fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
