use std::time::{Duration, Instant};

use polaris_digest::models::{Filter, Project};
use polaris_digest::polaris::{FetchError, PolarisClient};
use reqwest::StatusCode;
use serde_json::{Value, json};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path, query_param},
};

mod test_utils;
use test_utils::{JWT, authenticated_client, polaris_config, project_listing, raw_issue, side_tables};

fn project() -> Project {
    Project {
        project_id: "p1".into(),
        project_name: "alpha".into(),
        branch_id: "branch-p1".into(),
    }
}

fn page(offset: usize, count: usize, total: usize) -> Value {
    let ids: Vec<String> = (offset..offset + count).map(|n| format!("i-{n}")).collect();
    let issues: Vec<(&str, &str)> = ids.iter().map(|id| (id.as_str(), "High")).collect();
    let data: Vec<Value> = issues.iter().map(|(id, sev)| raw_issue(id, sev)).collect();
    json!({
        "data": data,
        "included": side_tables(&issues),
        "meta": {"total": total, "limit": 500, "offset": offset}
    })
}

#[tokio::test]
async fn authenticate_exchanges_token_for_jwt() {
    let server = MockServer::start().await;
    let client = authenticated_client(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/api/common/v0/projects"))
        .and(header("authorization", format!("Bearer {JWT}").as_str()))
        .and(header("accept", "application/vnd.api+json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(project_listing(&[("p1", "alpha")])))
        .expect(1)
        .mount(&server)
        .await;

    let inventory = client.list_projects().await.unwrap();
    assert_eq!(inventory.projects, vec![project()]);
    assert_eq!(inventory.runs.len(), 1);
}

#[tokio::test]
async fn authentication_failure_is_fatal_after_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/authenticate"))
        .respond_with(ResponseTemplate::new(401))
        .expect(3)
        .mount(&server)
        .await;

    let err = PolarisClient::authenticate(&polaris_config(&server, 3))
        .await
        .err()
        .expect("authentication must fail");
    assert_eq!(err.attempts, 3);
    assert_eq!(err.last.status, Some(StatusCode::UNAUTHORIZED));
}

#[tokio::test]
async fn response_without_jwt_counts_as_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/authenticate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "nope"})))
        .expect(2)
        .mount(&server)
        .await;

    let err = PolarisClient::authenticate(&polaris_config(&server, 2))
        .await
        .err()
        .expect("missing jwt must fail");
    assert_eq!(err.attempts, 2);
}

#[tokio::test]
async fn jwt_unusable_as_header_fails_authentication() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/authenticate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"jwt": "bad\njwt"})))
        .expect(2)
        .mount(&server)
        .await;

    let err = PolarisClient::authenticate(&polaris_config(&server, 2))
        .await
        .err()
        .expect("invalid jwt must fail");
    assert_eq!(err.attempts, 2);
    assert_eq!(err.last.status, Some(StatusCode::OK));
    assert!(err.last.reason.contains("header"));
}

#[tokio::test]
async fn remaining_pages_are_fetched_once_each() {
    let server = MockServer::start().await;
    let client = authenticated_client(&server, 1).await;

    for (offset, count) in [(0, 500), (500, 500), (1000, 200)] {
        Mock::given(method("GET"))
            .and(path("/api/query/v1/issues"))
            .and(query_param("page[offset]", offset.to_string().as_str()))
            .and(query_param("page[limit]", "500"))
            .and(query_param("project-id", "p1"))
            .and(query_param("branch-id", "branch-p1"))
            .and(query_param("filter[issue][status][$eq]", "opened"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(offset, count, 1200)))
            .expect(1)
            .mount(&server)
            .await;
    }

    let batch = client.fetch_issues(&project(), &Filter::default()).await.unwrap();
    assert_eq!(batch.data.len(), 1200);

    let mut ids: Vec<&str> = batch.data.iter().map(|issue| issue.id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 1200);
}

/// Serves `total` issues in pages of 10. The first page answers at once,
/// every later page after `delay`.
async fn mount_slow_pages(server: &MockServer, total: usize, delay: Duration) {
    let small_page = |offset: usize| {
        let mut body = page(offset, 10, total);
        body["meta"]["limit"] = json!(10);
        body
    };

    Mock::given(method("GET"))
        .and(path("/api/query/v1/issues"))
        .and(query_param("page[offset]", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(small_page(0)))
        .with_priority(1)
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/query/v1/issues"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(small_page(10))
                .set_delay(delay),
        )
        .expect((total / 10 - 1) as u64)
        .mount(server)
        .await;
}

async fn client_with_cap(server: &MockServer, max_concurrency: usize) -> PolarisClient {
    test_utils::mount_auth(server).await;
    let mut config = polaris_config(server, 1);
    config.max_concurrency = max_concurrency;
    PolarisClient::authenticate(&config).await.unwrap()
}

#[tokio::test]
async fn remaining_pages_are_requested_concurrently() {
    let server = MockServer::start().await;
    let delay = Duration::from_millis(400);
    mount_slow_pages(&server, 60, delay).await;
    let client = client_with_cap(&server, 4).await;

    let started = Instant::now();
    let batch = client.fetch_issues(&project(), &Filter::default()).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(batch.data.len(), 60);
    // five delayed pages with four slots take two rounds, not five
    assert!(elapsed < delay * 4, "pages were fetched one by one: {elapsed:?}");
}

#[tokio::test]
async fn concurrency_cap_of_one_serializes_requests() {
    let server = MockServer::start().await;
    let delay = Duration::from_millis(300);
    mount_slow_pages(&server, 40, delay).await;
    let client = client_with_cap(&server, 1).await;

    let started = Instant::now();
    let batch = client.fetch_issues(&project(), &Filter::default()).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(batch.data.len(), 40);
    assert!(elapsed >= delay * 3, "cap was not enforced: {elapsed:?}");
}

#[tokio::test]
async fn filter_flags_shape_the_issue_query() {
    let server = MockServer::start().await;
    let client = authenticated_client(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/api/query/v1/issues"))
        .and(query_param(
            "filter[issue][taxonomy][taxonomy-type][issue-kind][taxon][$eq]",
            "security",
        ))
        .and(query_param("filter[issue][triage-status][$eq]", "not-triaged"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(0, 3, 3)))
        .expect(1)
        .mount(&server)
        .await;

    let filter = Filter {
        only_security: true,
        only_untriaged: true,
        only_med_high: false,
    };
    let batch = client.fetch_issues(&project(), &filter).await.unwrap();
    assert_eq!(batch.data.len(), 3);
}

#[tokio::test]
async fn failing_page_exhausts_retries_with_last_status() {
    let server = MockServer::start().await;
    let client = authenticated_client(&server, 2).await;

    Mock::given(method("GET"))
        .and(path("/api/query/v1/issues"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let err = client
        .fetch_issues(&project(), &Filter::default())
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Exhausted { attempts: 2, .. }));
    assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
}

#[tokio::test]
async fn unparseable_listing_is_retried_then_fatal() {
    let server = MockServer::start().await;
    let client = authenticated_client(&server, 2).await;

    Mock::given(method("GET"))
        .and(path("/api/common/v0/projects"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .expect(2)
        .mount(&server)
        .await;

    let err = client.list_projects().await.unwrap_err();
    assert!(matches!(err, FetchError::Exhausted { attempts: 2, .. }));
    assert_eq!(err.status(), Some(StatusCode::OK));
}

#[tokio::test]
async fn listing_applies_application_and_property_filters() {
    let server = MockServer::start().await;
    test_utils::mount_auth(&server).await;

    let mut config = polaris_config(&server, 1);
    config.application_id = Some("app-7".into());
    config
        .project_properties
        .insert("team".into(), "red".into());
    let client = PolarisClient::authenticate(&config).await.unwrap();

    Mock::given(method("GET"))
        .and(path("/api/common/v0/projects"))
        .and(query_param("application-id", "app-7"))
        .and(query_param("filter[project][properties][team][$eq]", "red"))
        .and(query_param("page[limit]", "500"))
        .respond_with(ResponseTemplate::new(200).set_body_json(project_listing(&[("p1", "alpha")])))
        .expect(1)
        .mount(&server)
        .await;

    let inventory = client.list_projects().await.unwrap();
    assert_eq!(inventory.projects.len(), 1);
}
