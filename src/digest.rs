//! # Digest pipeline
//!
//! authenticate → list projects → fetch and normalize issues per project →
//! optional untriaged pass → publish.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{Instrument, debug, info, info_span, instrument};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::{Filter, Project, ProjectSummary};
use crate::normalization::normalize_issues;
use crate::notifiers::Notifier;
use crate::polaris::{PolarisClient, RunPool};

/// Run one digest end to end and return what was published.
pub async fn run_digest(
    config: &AppConfig,
    notifier: &dyn Notifier,
) -> Result<Vec<ProjectSummary>, AppError> {
    let run_id = Uuid::new_v4();
    let span = info_span!("digest", %run_id, notifier = notifier.name());

    async move {
        let client = PolarisClient::authenticate(&config.polaris).await?;
        let inventory = client.list_projects().await?;
        let runs = Arc::new(inventory.runs);

        let mut summaries =
            collect_summaries(&client, &inventory.projects, &runs, config.filter).await?;

        if notifier.needs_untriaged() {
            let untriaged =
                collect_summaries(&client, &inventory.projects, &runs, config.filter.untriaged())
                    .await?;
            merge_untriaged(&mut summaries, untriaged);
        }

        notifier.publish(&summaries, &config.filter).await?;

        info!(
            projects = summaries.len(),
            issues = summaries.iter().map(|s| s.issues.len()).sum::<usize>(),
            "Digest published"
        );
        Ok(summaries)
    }
    .instrument(span)
    .await
}

/// Summaries of every project with at least one matching issue, sorted by
/// project name. The first failing project aborts the others.
pub async fn collect_summaries(
    client: &PolarisClient,
    projects: &[Project],
    runs: &Arc<RunPool>,
    filter: Filter,
) -> Result<Vec<ProjectSummary>, AppError> {
    let mut tasks = JoinSet::new();
    for project in projects {
        let client = client.clone();
        let project = project.clone();
        let runs = Arc::clone(runs);
        tasks.spawn(
            async move { summarize_project(&client, &project, &runs, filter).await }
                .in_current_span(),
        );
    }

    let mut summaries = Vec::with_capacity(projects.len());
    while let Some(joined) = tasks.join_next().await {
        if let Some(summary) = joined?? {
            summaries.push(summary);
        }
    }

    summaries.sort_by(|a, b| a.project_name.cmp(&b.project_name));
    Ok(summaries)
}

#[instrument(skip_all, fields(project = %project.project_name))]
async fn summarize_project(
    client: &PolarisClient,
    project: &Project,
    runs: &RunPool,
    filter: Filter,
) -> Result<Option<ProjectSummary>, AppError> {
    let batch = client.fetch_issues(project, &filter).await?;
    let links = client.links();

    let mut issues = normalize_issues(&batch.data, &batch.included, runs, project, links)?;
    if filter.only_med_high {
        issues.retain(|issue| issue.severity.is_medium_or_higher());
    }

    if issues.is_empty() {
        debug!("No matching issues; leaving project out");
        return Ok(None);
    }
    info!(issues = issues.len(), "Collected project issues");

    Ok(Some(ProjectSummary {
        project_name: project.project_name.clone(),
        project_id: project.project_id.clone(),
        branch_id: project.branch_id.clone(),
        direct_link: links.project_url(&project.project_id, &project.branch_id, &filter),
        direct_link_untriaged: links.project_url(
            &project.project_id,
            &project.branch_id,
            &filter.untriaged(),
        ),
        issues,
        untriaged_issues: Vec::new(),
    }))
}

/// Attach the untriaged pass to the full pass by project id. Projects
/// missing from the untriaged pass get an empty list.
pub fn merge_untriaged(summaries: &mut [ProjectSummary], untriaged: Vec<ProjectSummary>) {
    let mut by_project: HashMap<String, _> = untriaged
        .into_iter()
        .map(|summary| (summary.project_id, summary.issues))
        .collect();

    for summary in summaries {
        summary.untriaged_issues = by_project.remove(&summary.project_id).unwrap_or_default();
    }
}
