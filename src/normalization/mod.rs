//! Issue normalization
//!
//! Turns the relational issue payload (issues plus `included` side tables
//! plus the run pool) into flat, sorted [`NormalizedIssue`] records.

pub mod relations;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::{IssuePath, NormalizedIssue, Project, Severity};
use crate::polaris::{LinkBuilder, Resource, RunPool};

pub use relations::{IncludedIndex, RelationKind, ResolvedIssue, ResolvedRelation, resolve_issue};

/// Errors that can occur while flattening resolved issues.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizationError {
    #[error("issue {issue_id} has unknown severity '{severity}'")]
    UnknownSeverity { issue_id: String, severity: String },
    #[error("issue {issue_id} is missing required field: {field}")]
    MissingField {
        issue_id: String,
        field: &'static str,
    },
}

/// Resolve, flatten and sort the issues of one project.
///
/// Output order is `(severity rank, issue-type, path)` ascending.
pub fn normalize_issues(
    data: &[Resource],
    included: &[Resource],
    runs: &RunPool,
    project: &Project,
    links: &LinkBuilder,
) -> Result<Vec<NormalizedIssue>, NormalizationError> {
    let index = IncludedIndex::new(included);

    let mut issues = data
        .iter()
        .map(|issue| flatten_issue(&resolve_issue(issue, &index, runs), project, links))
        .collect::<Result<Vec<_>, _>>()?;

    sort_issues(&mut issues);
    Ok(issues)
}

pub fn sort_issues(issues: &mut [NormalizedIssue]) {
    issues.sort_by(|a, b| {
        a.severity
            .rank()
            .cmp(&b.severity.rank())
            .then_with(|| a.issue_type.cmp(&b.issue_type))
            .then_with(|| a.path.sort_key().cmp(&b.path.sort_key()))
    });
}

/// Build the flat record from a resolved issue.
pub fn flatten_issue(
    issue: &ResolvedIssue,
    project: &Project,
    links: &LinkBuilder,
) -> Result<NormalizedIssue, NormalizationError> {
    let missing = |field: &'static str| NormalizationError::MissingField {
        issue_id: issue.id.clone(),
        field,
    };

    let severity_name = related_scalar(issue, "severity", "name").ok_or_else(|| missing("severity"))?;
    let severity: Severity =
        severity_name
            .parse()
            .map_err(|severity| NormalizationError::UnknownSeverity {
                issue_id: issue.id.clone(),
                severity,
            })?;

    let path = match issue.relations.get("path") {
        Some(ResolvedRelation::PathText(text)) => IssuePath::Text(text.clone()),
        Some(ResolvedRelation::Attributes(attributes)) => IssuePath::Attributes(attributes.clone()),
        _ => return Err(missing("path")),
    };

    let attribute = |name: &'static str| {
        scalar(issue.attributes.get(name)).ok_or_else(|| missing(name))
    };
    let revision_id = attribute("revision-id")?;

    Ok(NormalizedIssue {
        severity,
        issue_kind: related_scalar(issue, "issue-kind", "name").ok_or_else(|| missing("issue-kind"))?,
        issue_type: related_scalar(issue, "issue-type", "issue-type")
            .ok_or_else(|| missing("issue-type"))?,
        issue_type_name: related_scalar(issue, "issue-type", "name")
            .ok_or_else(|| missing("issue-type-name"))?,
        path,
        kind: issue.kind.clone(),
        finding_id: attribute("finding-key")?,
        issue_key: attribute("issue-key")?,
        sub_tool: attribute("sub-tool")?,
        latest_observed_on_run: attribute("latest-observed-on-run")?,
        direct_link: links.issue_url(
            &project.project_id,
            &project.branch_id,
            &revision_id,
            &issue.id,
        ),
        revision_id,
        id: issue.id.clone(),
    })
}

fn related_scalar(issue: &ResolvedIssue, relation: &str, field: &str) -> Option<String> {
    issue
        .attributes_of(relation)
        .and_then(|attributes: &Map<String, Value>| scalar(attributes.get(field)))
}

/// Render a JSON scalar as a string; objects, arrays and null yield `None`.
fn scalar(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}
