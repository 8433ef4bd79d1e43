//! JiraClient against an in-process fake tracker
//!
//! The fake serves `/rest/api/3/issue/:key` on an ephemeral port and
//! requires Basic auth for `bot:secret`.

use axum::{
    extract::Path,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;

use jrep_common::config::TrackerConfig;
use jrep_export::tracker::{IssueLookup, JiraClient, LookupError};

/// base64("bot:secret")
const EXPECTED_AUTH: &str = "Basic Ym90OnNlY3JldA==";

async fn issue_handler(Path(key): Path<String>, headers: HeaderMap) -> Response {
    let authorized = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == EXPECTED_AUTH)
        .unwrap_or(false);
    if !authorized {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    match key.as_str() {
        "ITSM-1" => Json(json!({
            "key": "ITSM-1",
            "fields": {
                "assignee": { "displayName": "Ann Smith" },
                "reporter": { "displayName": "Rob Jones" },
                "created": "2024-03-01T10:00:00.000+0000",
                "summary": "Login fails",
                "customfield_10027": [
                    {
                        "finalDecision": "approved",
                        "completedDate": { "jira": "2024-03-02T09:00:00.000+0000" },
                        "approvers": [
                            { "approver": { "displayName": "Early Approver" } }
                        ]
                    },
                    {
                        "finalDecision": "declined",
                        "completedDate": { "jira": "2024-03-09T09:00:00.000+0000" },
                        "approvers": [
                            { "approver": { "displayName": "Declined Approver" } }
                        ]
                    },
                    {
                        "finalDecision": "approved",
                        "completedDate": { "jira": "2024-03-05T09:00:00.000+0000" },
                        "approvers": [
                            { "approver": { "displayName": "Late Approver" } },
                            { "approver": { "displayName": "Second Late Approver" } }
                        ]
                    }
                ]
            }
        }))
        .into_response(),
        "ITSM-2" => Json(json!({
            "key": "ITSM-2",
            "fields": {
                "assignee": null,
                "reporter": { "displayName": "Rob Jones" },
                "created": "2024-03-03T10:00:00.000+0000",
                "customfield_10027": null
            }
        }))
        .into_response(),
        "ITSM-3" => (StatusCode::OK, "<html>maintenance</html>").into_response(),
        "ITSM-4" => Json(json!({
            "key": "ITSM-4",
            "fields": {
                "assignee": { "displayName": "Ann Smith" },
                "customfield_10027": { "unexpected": "shape" }
            }
        }))
        .into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Start the fake tracker; returns its base URL
async fn spawn_fake_tracker() -> String {
    let app = Router::new().route("/rest/api/3/issue/:key", get(issue_handler));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/", addr)
}

fn client(base_url: &str, user: &str, token: &str) -> JiraClient {
    JiraClient::new(&TrackerConfig {
        base_url: Some(base_url.to_string()),
        user: Some(user.to_string()),
        api_token: Some(token.to_string()),
        timeout_secs: 5,
        ..Default::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_fetch_issue_reduces_record() {
    let base_url = spawn_fake_tracker().await;
    let jira = client(&base_url, "bot", "secret");

    let detail = jira.fetch_issue("ITSM-1").await.unwrap();
    assert_eq!(detail.assignee, "Ann Smith");
    assert_eq!(detail.reporter, "Rob Jones");
    assert_eq!(detail.created, "2024-03-01T10:00:00.000+0000");
    // Latest approved entry wins; its first approver is reported
    assert_eq!(detail.latest_approver, "Late Approver");
    assert_eq!(detail.latest_approval_time, "2024-03-05T09:00:00.000+0000");
}

#[tokio::test]
async fn test_fetch_issue_with_null_fields() {
    let base_url = spawn_fake_tracker().await;
    let jira = client(&base_url, "bot", "secret");

    let detail = jira.fetch_issue("ITSM-2").await.unwrap();
    assert_eq!(detail.assignee, "");
    assert_eq!(detail.reporter, "Rob Jones");
    assert_eq!(detail.latest_approver, "");
    assert_eq!(detail.latest_approval_time, "");
}

#[tokio::test]
async fn test_unexpected_approvals_shape_is_ignored() {
    let base_url = spawn_fake_tracker().await;
    let jira = client(&base_url, "bot", "secret");

    let detail = jira.fetch_issue("ITSM-4").await.unwrap();
    assert_eq!(detail.assignee, "Ann Smith");
    assert_eq!(detail.latest_approver, "");
}

#[tokio::test]
async fn test_missing_issue_is_unavailable() {
    let base_url = spawn_fake_tracker().await;
    let jira = client(&base_url, "bot", "secret");

    let err = jira.fetch_issue("ITSM-404").await.unwrap_err();
    assert!(matches!(err, LookupError::Unavailable(_)));
}

#[tokio::test]
async fn test_bad_credentials_are_unavailable() {
    let base_url = spawn_fake_tracker().await;
    let jira = client(&base_url, "bot", "wrong");

    let err = jira.fetch_issue("ITSM-1").await.unwrap_err();
    assert!(matches!(err, LookupError::Unavailable(_)));
}

#[tokio::test]
async fn test_non_json_body_is_malformed() {
    let base_url = spawn_fake_tracker().await;
    let jira = client(&base_url, "bot", "secret");

    let err = jira.fetch_issue("ITSM-3").await.unwrap_err();
    assert!(matches!(err, LookupError::Malformed(_)));
}

#[tokio::test]
async fn test_unreachable_tracker_is_unavailable() {
    // Bind then drop to get a port nobody listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let jira = client(&format!("http://{}", addr), "bot", "secret");
    let err = jira.fetch_issue("ITSM-1").await.unwrap_err();
    assert!(matches!(err, LookupError::Unavailable(_)));
}

#[tokio::test]
async fn test_issue_link_uses_normalized_base() {
    let jira = client("https://jira.example.com/", "bot", "secret");
    assert_eq!(jira.base_url(), Some("https://jira.example.com"));
    assert_eq!(
        jira.issue_link("ITSM-7"),
        "https://jira.example.com/browse/ITSM-7"
    );
}
