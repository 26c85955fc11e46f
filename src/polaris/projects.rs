//! Project inventory: main branches and the run pool

use std::collections::HashMap;

use serde_json::Value;
use tracing::{info, instrument, warn};

use super::error::FetchError;
use super::models::{ProjectListing, Run, RunPool};
use super::PolarisClient;
use crate::models::Project;

const PROJECTS_PATH: &str = "/api/common/v0/projects";
const PROJECT_PAGE_LIMIT: u32 = 500;

/// Projects to scan plus every run included with the listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inventory {
    pub projects: Vec<Project>,
    pub runs: RunPool,
}

impl PolarisClient {
    /// Fetch the project listing with branches and runs included.
    #[instrument(skip_all)]
    pub async fn list_projects(&self) -> Result<Inventory, FetchError> {
        let resource = "project listing";
        let mut url = self
            .links()
            .join(PROJECTS_PATH)
            .map_err(|source| FetchError::Url {
                resource: resource.to_string(),
                source,
            })?;
        {
            let config = self.config();
            let mut query = url.query_pairs_mut();
            query.append_pair("page[limit]", &PROJECT_PAGE_LIMIT.to_string());
            if let Some(application_id) = &config.application_id {
                query.append_pair("application-id", application_id);
            }
            for (key, value) in &config.project_properties {
                query.append_pair(&format!("filter[project][properties][{key}][$eq]"), value);
            }
            query
                .append_pair("include[project][]", "branches")
                .append_pair("include[project][]", "runs");
        }

        let listing: ProjectListing = self.get_json(resource, url).await?;
        let inventory = partition_listing(&listing);

        info!(
            projects = inventory.projects.len(),
            runs = inventory.runs.len(),
            "Loaded Polaris project inventory"
        );
        Ok(inventory)
    }
}

/// Split the listing's `included` array into main-branch projects and runs.
/// Non-main branches and every other included type are dropped.
pub fn partition_listing(listing: &ProjectListing) -> Inventory {
    let names: HashMap<&str, &str> = listing
        .data
        .iter()
        .filter_map(|project| {
            project
                .attribute("name")
                .and_then(Value::as_str)
                .map(|name| (project.id.as_str(), name))
        })
        .collect();

    let mut inventory = Inventory::default();

    for include in &listing.included {
        match include.kind.as_str() {
            "branch" => {
                let is_main = include
                    .attribute("main-for-project")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                if !is_main {
                    continue;
                }
                let Some(project_id) = include.related_id("project") else {
                    warn!(branch_id = %include.id, "Main branch without a project reference");
                    continue;
                };
                let Some(project_name) = names.get(project_id) else {
                    warn!(
                        branch_id = %include.id,
                        project_id,
                        "Main branch refers to a project missing from the listing"
                    );
                    continue;
                };
                inventory.projects.push(Project {
                    project_id: project_id.to_string(),
                    project_name: project_name.to_string(),
                    branch_id: include.id.clone(),
                });
            }
            "run" => inventory.runs.insert(Run::from(include)),
            _ => {}
        }
    }

    inventory
}
