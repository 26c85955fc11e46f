//! Test utilities for driving the client against a mocked Polaris.
//!
//! Provides payload builders for the JSON:API responses and helpers that
//! mount the authentication and listing endpoints on a `wiremock` server.

use std::collections::BTreeMap;

use polaris_digest::config::PolarisConfig;
use polaris_digest::polaris::{PolarisClient, RetryPolicy};
use serde_json::{Value, json};
use url::Url;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_string_contains, method, path},
};

pub const TOKEN: &str = "api-token";
#[allow(dead_code)]
pub const JWT: &str = "jwt-123";

/// Config pointing at the mock server, retrying without waiting.
#[allow(dead_code)]
pub fn polaris_config(server: &MockServer, retries: u32) -> PolarisConfig {
    PolarisConfig {
        base_url: Url::parse(&server.uri()).unwrap(),
        token: TOKEN.to_string(),
        retry: RetryPolicy {
            retries,
            wait_seconds: 0,
        },
        max_concurrency: 4,
        application_id: None,
        project_properties: BTreeMap::new(),
    }
}

/// Mounts a successful token exchange.
pub async fn mount_auth(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/auth/authenticate"))
        .and(body_string_contains(format!("accesstoken={TOKEN}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "jwt": JWT })))
        .mount(server)
        .await;
}

#[allow(dead_code)]
pub async fn authenticated_client(server: &MockServer, retries: u32) -> PolarisClient {
    mount_auth(server).await;
    PolarisClient::authenticate(&polaris_config(server, retries))
        .await
        .expect("mock authentication succeeds")
}

/// Listing with one main branch per `(project_id, name)` and a single run.
#[allow(dead_code)]
pub fn project_listing(projects: &[(&str, &str)]) -> Value {
    let data: Vec<Value> = projects
        .iter()
        .map(|(id, name)| json!({"id": id, "type": "project", "attributes": {"name": name}}))
        .collect();

    let mut included: Vec<Value> = projects
        .iter()
        .map(|(id, _)| {
            json!({
                "id": format!("branch-{id}"),
                "type": "branch",
                "attributes": {"main-for-project": true},
                "relationships": {"project": {"data": {"type": "project", "id": id}}}
            })
        })
        .collect();
    included.push(json!({
        "id": "run-1",
        "type": "run",
        "attributes": {},
        "relationships": {"revision": {"data": {"type": "revision", "id": "rev-1"}}}
    }));

    json!({ "data": data, "included": included })
}

/// Raw issue resource referencing the side tables built by [`side_tables`].
#[allow(dead_code)]
pub fn raw_issue(id: &str, severity: &str) -> Value {
    json!({
        "id": id,
        "type": "issue",
        "attributes": {
            "finding-key": format!("finding-{id}"),
            "issue-key": format!("key-{id}"),
            "sub-tool": "sast"
        },
        "relationships": {
            "severity": {"data": {"type": "taxon", "id": severity}},
            "issue-kind": {"data": {"type": "taxon", "id": "security"}},
            "issue-type": {"data": {"type": "issue-type", "id": "sql-injection"}},
            "path": {"data": {"type": "path", "id": format!("path-{id}")}},
            "latest-observed-on-run": {"data": {"type": "run", "id": "run-1"}},
            "transitions": {"data": []}
        }
    })
}

/// Included resources for every issue in `issues`.
#[allow(dead_code)]
pub fn side_tables(issues: &[(&str, &str)]) -> Vec<Value> {
    let mut included = vec![
        json!({"id": "security", "type": "taxon", "attributes": {"name": "Security"}}),
        json!({
            "id": "sql-injection",
            "type": "issue-type",
            "attributes": {"issue-type": "sql-injection", "name": "SQL Injection"}
        }),
    ];
    for severity in ["Critical", "High", "Medium", "Low", "Audit"] {
        included.push(json!({"id": severity, "type": "taxon", "attributes": {"name": severity}}));
    }
    for (id, _) in issues {
        included.push(json!({
            "id": format!("path-{id}"),
            "type": "path",
            "attributes": {"path": ["src", format!("{id}.rs")], "path-type": "unknown"}
        }));
    }
    included
}

/// A single-page issue response holding exactly `issues`.
#[allow(dead_code)]
pub fn issue_page(issues: &[(&str, &str)]) -> Value {
    let data: Vec<Value> = issues
        .iter()
        .map(|(id, severity)| raw_issue(id, severity))
        .collect();
    json!({
        "data": data,
        "included": side_tables(issues),
        "meta": {"total": issues.len(), "limit": 500, "offset": 0}
    })
}
