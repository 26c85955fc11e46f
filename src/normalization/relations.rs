//! Relationship resolution against the included and run pools

use std::collections::{BTreeMap, HashMap};

use metrics::counter;
use serde_json::{Map, Value};
use tracing::debug;

use crate::models::issue::join_segments;
use crate::polaris::{Resource, ResourceRef, RunPool};

/// Relationship names the normalizer knows how to project.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RelationKind {
    Severity,
    IssueKind,
    IssueType,
    Path,
    LatestObservedOnRun,
    /// Never needed; skipped without lookup
    Transitions,
    /// Kept as the list of referenced resources
    Other(String),
}

impl RelationKind {
    pub fn parse(name: &str) -> Self {
        match name {
            "severity" => RelationKind::Severity,
            "issue-kind" => RelationKind::IssueKind,
            "issue-type" => RelationKind::IssueType,
            "path" => RelationKind::Path,
            "latest-observed-on-run" => RelationKind::LatestObservedOnRun,
            "transitions" => RelationKind::Transitions,
            other => RelationKind::Other(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            RelationKind::Severity => "severity",
            RelationKind::IssueKind => "issue-kind",
            RelationKind::IssueType => "issue-type",
            RelationKind::Path => "path",
            RelationKind::LatestObservedOnRun => "latest-observed-on-run",
            RelationKind::Transitions => "transitions",
            RelationKind::Other(name) => name,
        }
    }
}

/// A relationship after lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedRelation {
    /// The referenced resource's whole attribute map
    Attributes(Map<String, Value>),
    /// An `unknown`-typed path joined with `/`
    PathText(String),
    /// Referenced resources of a relation outside the known set
    Raw(Vec<Resource>),
}

/// An issue whose relationships have been looked up but not yet flattened.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedIssue {
    pub id: String,
    pub kind: String,
    /// The issue's attributes, extended with `latest-observed-on-run` and
    /// `revision-id` when the run resolves
    pub attributes: Map<String, Value>,
    pub relations: BTreeMap<String, ResolvedRelation>,
    /// Relationships whose target was not found in either pool
    pub unresolved: Vec<String>,
}

impl ResolvedIssue {
    pub fn attributes_of(&self, relation: &str) -> Option<&Map<String, Value>> {
        match self.relations.get(relation) {
            Some(ResolvedRelation::Attributes(attributes)) => Some(attributes),
            _ => None,
        }
    }
}

/// `included` resources addressable by `(type, id)`.
pub struct IncludedIndex<'a> {
    resources: HashMap<(&'a str, &'a str), &'a Resource>,
}

impl<'a> IncludedIndex<'a> {
    pub fn new(included: &'a [Resource]) -> Self {
        let mut resources = HashMap::with_capacity(included.len());
        for resource in included {
            // first occurrence wins, matching a linear scan
            resources
                .entry((resource.kind.as_str(), resource.id.as_str()))
                .or_insert(resource);
        }
        Self { resources }
    }

    pub fn get(&self, reference: &ResourceRef) -> Option<&'a Resource> {
        self.resources
            .get(&(reference.kind.as_str(), reference.id.as_str()))
            .copied()
    }
}

/// Resolve every relationship of `issue`.
///
/// `latest-observed-on-run` is looked up in `runs` only; everything else in
/// `included`. Missing targets are dropped and recorded in `unresolved`.
pub fn resolve_issue(issue: &Resource, included: &IncludedIndex<'_>, runs: &RunPool) -> ResolvedIssue {
    let mut resolved = ResolvedIssue {
        id: issue.id.clone(),
        kind: issue.kind.clone(),
        attributes: issue.attributes.clone().unwrap_or_default(),
        relations: BTreeMap::new(),
        unresolved: Vec::new(),
    };

    for (name, relationship) in &issue.relationships {
        let kind = RelationKind::parse(name);
        let refs = relationship.refs();
        let Some(first) = refs.first() else {
            continue;
        };

        let found = match &kind {
            RelationKind::LatestObservedOnRun => match runs.get(first) {
                Some(run) => {
                    resolved.attributes.insert(
                        "latest-observed-on-run".to_string(),
                        Value::String(run.run_id.clone()),
                    );
                    if let Some(revision_id) = &run.revision_id {
                        resolved
                            .attributes
                            .insert("revision-id".to_string(), Value::String(revision_id.clone()));
                    }
                    true
                }
                None => false,
            },
            RelationKind::Path => match included.get(first).and_then(|r| r.attributes.as_ref()) {
                Some(attributes) => {
                    resolved
                        .relations
                        .insert(name.clone(), resolve_path(attributes));
                    true
                }
                None => false,
            },
            RelationKind::Severity | RelationKind::IssueKind | RelationKind::IssueType => {
                match included.get(first).and_then(|r| r.attributes.as_ref()) {
                    Some(attributes) => {
                        resolved
                            .relations
                            .insert(name.clone(), ResolvedRelation::Attributes(attributes.clone()));
                        true
                    }
                    None => false,
                }
            }
            RelationKind::Other(_) => {
                let targets: Vec<Resource> = refs
                    .iter()
                    .filter_map(|reference| included.get(reference))
                    .cloned()
                    .collect();
                if targets.is_empty() {
                    false
                } else {
                    resolved
                        .relations
                        .insert(name.clone(), ResolvedRelation::Raw(targets));
                    true
                }
            }
            RelationKind::Transitions => continue,
        };

        if !found {
            debug!(
                issue_id = %issue.id,
                relation = kind.name(),
                target_type = %first.kind,
                target_id = %first.id,
                "Relationship target not found; dropping it"
            );
            counter!("polaris_unresolved_relations_total", "relation" => kind.name().to_string())
                .increment(1);
            resolved.unresolved.push(name.clone());
        }
    }

    resolved
}

fn resolve_path(attributes: &Map<String, Value>) -> ResolvedRelation {
    let is_unknown = attributes.get("path-type").and_then(Value::as_str) == Some("unknown");
    match attributes.get("path") {
        Some(Value::Array(segments)) if is_unknown => {
            ResolvedRelation::PathText(join_segments(segments))
        }
        _ => ResolvedRelation::Attributes(attributes.clone()),
    }
}
