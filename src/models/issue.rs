//! Normalized issue records

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// Issue severity. Declaration order is the severity rank used for sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Audit,
}

/// Every severity in rank order.
pub const ALL_SEVERITIES: &[Severity] = &[
    Severity::Critical,
    Severity::High,
    Severity::Medium,
    Severity::Low,
    Severity::Audit,
];

impl Severity {
    /// Fixed ordinal: Critical=0 through Audit=4.
    pub const fn rank(self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::High => 1,
            Severity::Medium => 2,
            Severity::Low => 3,
            Severity::Audit => 4,
        }
    }

    /// The name Polaris uses for this severity.
    pub const fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
            Severity::Audit => "Audit",
        }
    }

    pub const fn is_medium_or_higher(self) -> bool {
        self.rank() <= Severity::Medium.rank()
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        ALL_SEVERITIES
            .iter()
            .copied()
            .find(|severity| severity.as_str() == name)
            .ok_or_else(|| name.to_string())
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Location of an issue.
///
/// Paths of type `unknown` arrive as a segment array and are joined into a
/// human-readable string; any other path type keeps its attribute map.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum IssuePath {
    Text(String),
    Attributes(Map<String, Value>),
}

impl IssuePath {
    /// String used when ordering issues by path.
    pub fn sort_key(&self) -> Cow<'_, str> {
        match self {
            IssuePath::Text(text) => Cow::Borrowed(text),
            IssuePath::Attributes(attributes) => match attributes.get("path") {
                Some(Value::Array(segments)) => Cow::Owned(join_segments(segments)),
                Some(Value::String(text)) => Cow::Borrowed(text),
                _ => Cow::Owned(Value::Object(attributes.clone()).to_string()),
            },
        }
    }
}

impl fmt::Display for IssuePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sort_key())
    }
}

/// Join path segments with `/`, rendering non-string segments as JSON.
pub fn join_segments(segments: &[Value]) -> String {
    segments
        .iter()
        .map(|segment| match segment {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// A self-contained issue with every relationship resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct NormalizedIssue {
    pub severity: Severity,
    pub issue_kind: String,
    pub issue_type: String,
    pub issue_type_name: String,
    pub id: String,
    pub path: IssuePath,
    #[serde(rename = "type")]
    pub kind: String,
    pub finding_id: String,
    pub issue_key: String,
    pub sub_tool: String,
    pub revision_id: String,
    pub latest_observed_on_run: String,
    pub direct_link: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn severity_ranks_follow_declaration_order() {
        let ranks: Vec<u8> = ALL_SEVERITIES.iter().map(|s| s.rank()).collect();
        assert_eq!(ranks, vec![0, 1, 2, 3, 4]);
        assert!(Severity::Critical < Severity::Audit);
    }

    #[test]
    fn unknown_severity_is_rejected() {
        assert_eq!("High".parse::<Severity>(), Ok(Severity::High));
        assert_eq!("Info".parse::<Severity>(), Err("Info".to_string()));
        assert!("high".parse::<Severity>().is_err());
    }

    #[test]
    fn structured_path_sorts_by_joined_segments() {
        let Value::Object(attributes) = json!({"path": ["src", "main.rs"], "path-type": "file"})
        else {
            unreachable!()
        };
        let path = IssuePath::Attributes(attributes);
        assert_eq!(path.sort_key(), "src/main.rs");
    }
}
