//! JSON:API payloads returned by Polaris

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;
use serde_json::{Map, Value};

/// `(type, id)` pointer to another resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct ResourceRef {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

/// Relationship target: a single reference or a to-many list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RelationshipData {
    One(ResourceRef),
    Many(Vec<ResourceRef>),
}

impl RelationshipData {
    pub fn refs(&self) -> &[ResourceRef] {
        match self {
            RelationshipData::One(reference) => std::slice::from_ref(reference),
            RelationshipData::Many(references) => references,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Relationship {
    #[serde(default)]
    pub data: Option<RelationshipData>,
}

impl Relationship {
    /// The referenced resources, empty when `data` is null, missing or `[]`.
    pub fn refs(&self) -> &[ResourceRef] {
        self.data.as_ref().map(RelationshipData::refs).unwrap_or(&[])
    }
}

/// Any JSON:API resource: issues, branches, runs and side-table entries.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Resource {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub attributes: Option<Map<String, Value>>,
    #[serde(default)]
    pub relationships: BTreeMap<String, Relationship>,
}

impl Resource {
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.as_ref().and_then(|attrs| attrs.get(name))
    }

    /// Id of the single resource referenced by `relation`, if any.
    pub fn related_id(&self, relation: &str) -> Option<&str> {
        self.relationships
            .get(relation)
            .and_then(|rel| rel.refs().first())
            .map(|reference| reference.id.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PageMeta {
    pub total: u64,
    pub limit: u64,
}

/// One page of `/api/query/v1/issues`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IssuePage {
    pub data: Vec<Resource>,
    #[serde(default)]
    pub included: Vec<Resource>,
    pub meta: PageMeta,
}

/// Response of `/api/common/v0/projects`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProjectListing {
    pub data: Vec<Resource>,
    #[serde(default)]
    pub included: Vec<Resource>,
}

/// Response of `/api/auth/authenticate`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub jwt: String,
}

/// Every page of one project's issues merged together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssueBatch {
    pub data: Vec<Resource>,
    pub included: Vec<Resource>,
}

impl IssueBatch {
    pub fn extend(&mut self, page: IssuePage) {
        self.data.extend(page.data);
        self.included.extend(page.included);
    }
}

/// A scan execution record from the project listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub run_id: String,
    pub kind: String,
    pub revision_id: Option<String>,
}

impl From<&Resource> for Run {
    fn from(resource: &Resource) -> Self {
        Self {
            run_id: resource.id.clone(),
            kind: resource.kind.clone(),
            revision_id: resource.related_id("revision").map(str::to_string),
        }
    }
}

/// Runs addressable by `(type, id)`, kept apart from per-issue `included`
/// resources.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunPool {
    runs: HashMap<(String, String), Run>,
}

impl RunPool {
    pub fn insert(&mut self, run: Run) {
        self.runs
            .insert((run.kind.clone(), run.run_id.clone()), run);
    }

    pub fn get(&self, reference: &ResourceRef) -> Option<&Run> {
        self.runs
            .get(&(reference.kind.clone(), reference.id.clone()))
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

impl FromIterator<Run> for RunPool {
    fn from_iter<I: IntoIterator<Item = Run>>(iter: I) -> Self {
        let mut pool = RunPool::default();
        for run in iter {
            pool.insert(run);
        }
        pool
    }
}
