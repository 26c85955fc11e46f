//! Browser links into the Polaris UI

use url::{Url, form_urlencoded};

use crate::models::Filter;

/// Builds issue and project URLs relative to the Polaris base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkBuilder {
    base: Url,
}

impl LinkBuilder {
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    /// Resolve an absolute path against the base URL.
    pub fn join(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base.join(path)
    }

    pub fn issue_url(
        &self,
        project_id: &str,
        branch_id: &str,
        revision_id: &str,
        issue_id: &str,
    ) -> String {
        self.path_url(&format!(
            "/projects/{project_id}/branches/{branch_id}/revisions/{revision_id}/issues/{issue_id}"
        ))
    }

    /// Link to the branch issue list with `filter` encoded as one query value.
    pub fn project_url(&self, project_id: &str, branch_id: &str, filter: &Filter) -> String {
        let mut filters = vec!["issue[status][$eq]=opened"];
        if filter.only_security {
            filters.push("issue[taxonomy][taxonomy-type][issue-kind][taxon][$eq]=security");
        }
        if filter.only_untriaged {
            filters.push("issue[triage-status][$eq]=not-triaged");
        }

        let encoded: String = form_urlencoded::byte_serialize(filters.join("&").as_bytes()).collect();
        format!(
            "{}?filter={encoded}",
            self.path_url(&format!("/projects/{project_id}/branches/{branch_id}/issues"))
        )
    }

    fn path_url(&self, path: &str) -> String {
        match self.base.join(path) {
            Ok(url) => url.to_string(),
            // only reachable with a cannot-be-a-base URL, which config rejects
            Err(_) => format!("{}{}", self.base.as_str().trim_end_matches('/'), path),
        }
    }
}
