//! Wire-level behaviour of the forge client against a local mock server:
//! authentication header, issue decode, label paging, error mapping, and the
//! degraded budget probe.

use fmr_forge::{ForgeClient, ForgeError, RateBudget};
use httpmock::prelude::*;
use serde_json::json;

fn issue_body() -> serde_json::Value {
    json!({
        "id": 88,
        "number": 7,
        "title": "flaky e2e",
        "body": "fails on arm64",
        "state": "open",
        "closed_at": null,
        "user": {"id": 21, "login": "octo"},
        "assignee": {"id": 22, "login": "ana"},
        "assignees": [{"id": 22, "login": "ana"}],
        "milestone": {
            "id": 5,
            "title": "v1.30",
            "state": "open",
            "number": 12,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-02T00:00:00Z",
            "closed_at": null,
            "creator": {"id": 23, "login": "rel-bot"}
        }
    })
}

#[tokio::test]
async fn scenario_get_issue_decodes_and_authenticates() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/repos/acme/widgets/issues/7")
                .header("authorization", "Bearer t0ken");
            then.status(200).json_body(issue_body());
        })
        .await;

    let client = ForgeClient::new(server.base_url(), Some("t0ken".to_string()));
    let issue = client.get_issue("acme", "widgets", 7).await.unwrap();

    mock.assert_async().await;
    assert_eq!(issue.id, 88);
    assert_eq!(issue.state, "open");
    assert_eq!(issue.milestone.as_ref().unwrap().id, 5);

    let observed = issue.into_observed();
    assert_eq!(observed.assignee.unwrap().login, "ana");
    assert_eq!(observed.milestone.unwrap().creator.unwrap().id, 23);
}

#[tokio::test]
async fn scenario_anonymous_mode_still_reads_issues() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/repos/acme/widgets/issues/7");
            then.status(200).json_body(issue_body());
        })
        .await;

    let client = ForgeClient::new(server.base_url(), None);
    let issue = client.get_issue("acme", "widgets", 7).await.unwrap();
    assert_eq!(issue.number, 7);
    mock.assert_async().await;
}

#[tokio::test]
async fn scenario_label_paging_follows_the_link_header() {
    let server = MockServer::start_async().await;
    let page1 = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/repos/acme/widgets/issues/7/labels")
                .query_param("page", "1");
            then.status(200)
                .header(
                    "link",
                    format!(
                        "<{}/repos/acme/widgets/issues/7/labels?per_page=1000&page=2>; rel=\"next\"",
                        server.base_url()
                    ),
                )
                .json_body(json!([{"id": 101, "name": "bug"}]));
        })
        .await;
    let page2 = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/repos/acme/widgets/issues/7/labels")
                .query_param("page", "2");
            then.status(200).json_body(json!([{"id": 102, "name": "sig/node"}]));
        })
        .await;

    let client = ForgeClient::new(server.base_url(), None);

    let (labels, next) = client.list_labels("acme", "widgets", 7, 1).await.unwrap();
    assert_eq!(labels.len(), 1);
    assert_eq!(next, Some(2));

    let (labels, next) = client.list_labels("acme", "widgets", 7, 2).await.unwrap();
    assert_eq!(labels[0].id, 102);
    assert_eq!(next, None);

    page1.assert_async().await;
    page2.assert_async().await;
}

#[tokio::test]
async fn scenario_api_errors_carry_status_and_message() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/repos/acme/widgets/issues/404");
            then.status(404).json_body(json!({"message": "Not Found"}));
        })
        .await;

    let client = ForgeClient::new(server.base_url(), None);
    let err = client.get_issue("acme", "widgets", 404).await.unwrap_err();
    match err {
        ForgeError::Api { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "Not Found");
        }
        other => panic!("expected api error, got {other}"),
    }
}

#[tokio::test]
async fn scenario_failed_budget_probe_degrades() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/rate_limit");
            then.status(500);
        })
        .await;

    let client = ForgeClient::new(server.base_url(), None);
    let check = client.check().await;
    assert_eq!(check.remaining, -1);
    assert_eq!(check.wait.as_secs(), 5);
}

#[tokio::test]
async fn scenario_budget_probe_reads_the_core_bucket() {
    let server = MockServer::start_async().await;
    let reset = chrono::Utc::now().timestamp() + 120;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/rate_limit");
            then.status(200).json_body(json!({
                "resources": {
                    "core": {"limit": 5000, "remaining": 4999, "reset": reset},
                    "search": {"limit": 30, "remaining": 30, "reset": reset}
                }
            }));
        })
        .await;

    let client = ForgeClient::new(server.base_url(), None);
    let check = client.rate_limit().await.unwrap();
    assert_eq!(check.remaining, 4999);
    // Declared reset plus the one-second margin.
    assert!(check.wait.as_secs() >= 115 && check.wait.as_secs() <= 121);
}
