//! Project inventory and per-project digest summaries

use serde::Serialize;

use super::issue::NormalizedIssue;

/// A project together with its main branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Project {
    pub project_id: String,
    pub project_name: String,
    pub branch_id: String,
}

/// Issues of one project as consumed by the notifiers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectSummary {
    pub project_name: String,
    pub project_id: String,
    pub branch_id: String,
    #[serde(rename = "direct-link")]
    pub direct_link: String,
    #[serde(rename = "direct-link-untriaged")]
    pub direct_link_untriaged: String,
    pub issues: Vec<NormalizedIssue>,
    /// Filled only when a notifier requested the untriaged pass
    #[serde(rename = "untriaged-issues")]
    pub untriaged_issues: Vec<NormalizedIssue>,
}
