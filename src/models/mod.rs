//! # Data Models
//!
//! Domain types shared by the fetch pipeline and the notifiers.

pub mod filter;
pub mod issue;
pub mod project;

pub use filter::Filter;
pub use issue::{IssuePath, NormalizedIssue, Severity};
pub use project::{Project, ProjectSummary};
