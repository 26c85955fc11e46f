//! Paginated issue queries

use tokio::task::JoinSet;
use tracing::{Instrument, debug, instrument};

use super::PolarisClient;
use super::error::FetchError;
use super::models::{IssueBatch, IssuePage};
use crate::models::{Filter, Project};

const ISSUES_PATH: &str = "/api/query/v1/issues";
pub const ISSUE_PAGE_LIMIT: u64 = 500;

/// Number of pages needed for `total` issues, including the first one.
pub fn page_count(total: u64, limit: u64) -> u64 {
    if limit == 0 {
        return 1;
    }
    total.div_ceil(limit).max(1)
}

impl PolarisClient {
    /// Fetch every open, non-dismissed issue of the project's main branch.
    ///
    /// The first page reveals `meta.total`; the remaining pages are then
    /// requested concurrently. Any page that exhausts its retries fails the
    /// whole fetch and cancels the pages still in flight.
    #[instrument(skip_all, fields(project = %project.project_name))]
    pub async fn fetch_issues(
        &self,
        project: &Project,
        filter: &Filter,
    ) -> Result<IssueBatch, FetchError> {
        let first = self
            .fetch_issue_page(project, filter, ISSUE_PAGE_LIMIT, 0)
            .await?;
        let meta = first.meta;
        let fetched = first.data.len() as u64;

        let mut batch = IssueBatch::default();
        batch.extend(first);

        if meta.total <= fetched {
            return Ok(batch);
        }

        let pages = page_count(meta.total, meta.limit);
        debug!(
            total = meta.total,
            limit = meta.limit,
            pages,
            "Fetching remaining issue pages"
        );

        let mut in_flight = JoinSet::new();
        for page in 1..pages {
            let client = self.clone();
            let project = project.clone();
            let filter = *filter;
            let limit = meta.limit;
            in_flight.spawn(
                async move {
                    client
                        .fetch_issue_page(&project, &filter, limit, page * limit)
                        .await
                }
                .in_current_span(),
            );
        }

        while let Some(joined) = in_flight.join_next().await {
            let page = joined.map_err(|source| FetchError::Task {
                resource: format!("issues of {}", project.project_name),
                source,
            })??;
            batch.extend(page);
        }

        Ok(batch)
    }

    async fn fetch_issue_page(
        &self,
        project: &Project,
        filter: &Filter,
        limit: u64,
        offset: u64,
    ) -> Result<IssuePage, FetchError> {
        let resource = format!("issues of {} at offset {offset}", project.project_name);
        let url = issue_query_url(self, project, filter, limit, offset).map_err(|source| {
            FetchError::Url {
                resource: resource.clone(),
                source,
            }
        })?;
        self.get_json(&resource, url).await
    }
}

fn issue_query_url(
    client: &PolarisClient,
    project: &Project,
    filter: &Filter,
    limit: u64,
    offset: u64,
) -> Result<url::Url, url::ParseError> {
    let mut url = client.links().join(ISSUES_PATH)?;
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("page[limit]", &limit.to_string())
            .append_pair("page[offset]", &offset.to_string())
            .append_pair("project-id", &project.project_id)
            .append_pair("branch-id", &project.branch_id)
            .append_pair("filter[issue][status][$eq]", "opened")
            .append_pair("filter[issue][dismissed][$eq]", "false")
            .append_pair("include[issue][]", "severity")
            .append_pair("include[issue][]", "issue-kind");
        if filter.only_security {
            query.append_pair(
                "filter[issue][taxonomy][taxonomy-type][issue-kind][taxon][$eq]",
                "security",
            );
        }
        if filter.only_untriaged {
            query.append_pair("filter[issue][triage-status][$eq]", "not-triaged");
        }
    }
    Ok(url)
}
