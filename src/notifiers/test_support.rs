use crate::models::{IssuePath, NormalizedIssue, ProjectSummary, Severity};

pub fn issue(id: &str, severity: Severity, sub_tool: &str, path: &str) -> NormalizedIssue {
    NormalizedIssue {
        severity,
        issue_kind: "security".into(),
        issue_type: "sql-injection".into(),
        issue_type_name: "SQL Injection".into(),
        id: id.into(),
        path: IssuePath::Text(path.into()),
        kind: "issue".into(),
        finding_id: format!("finding-{id}"),
        issue_key: format!("key-{id}"),
        sub_tool: sub_tool.into(),
        revision_id: "rev-1".into(),
        latest_observed_on_run: "run-1".into(),
        direct_link: format!("https://polaris.example/issues/{id}"),
    }
}

pub fn summary(
    name: &str,
    issues: Vec<NormalizedIssue>,
    untriaged_issues: Vec<NormalizedIssue>,
) -> ProjectSummary {
    ProjectSummary {
        project_name: name.into(),
        project_id: format!("id-{name}"),
        branch_id: format!("branch-{name}"),
        direct_link: format!("https://polaris.example/projects/{name}"),
        direct_link_untriaged: format!("https://polaris.example/projects/{name}?untriaged"),
        issues,
        untriaged_issues,
    }
}
