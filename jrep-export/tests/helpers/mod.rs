//! Test Helper Utilities
//!
//! Shared utilities for testing jrep-export

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, Response},
    Router,
};
use http_body_util::BodyExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::util::ServiceExt;
use url::form_urlencoded;

use jrep_common::{AggregationMode, ProgressEvent};
use jrep_export::extract::ReferenceExtractor;
use jrep_export::tracker::{IssueDetail, IssueLookup, LookupError};
use jrep_export::AppState;

/// Lookup returning canned details and recording every call
#[derive(Default)]
pub struct StubLookup {
    details: HashMap<String, IssueDetail>,
    calls: Mutex<Vec<String>>,
}

impl StubLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_issue(mut self, key: &str, assignee: &str, approver: &str) -> Self {
        self.details.insert(
            key.to_string(),
            IssueDetail {
                assignee: assignee.to_string(),
                reporter: "Reporter".to_string(),
                created: "2024-01-01T09:00:00".to_string(),
                latest_approver: approver.to_string(),
                latest_approval_time: "2024-01-02".to_string(),
            },
        );
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl IssueLookup for StubLookup {
    async fn fetch_issue(&self, issue_key: &str) -> Result<IssueDetail, LookupError> {
        self.calls.lock().unwrap().push(issue_key.to_string());
        self.details
            .get(issue_key)
            .cloned()
            .ok_or_else(|| LookupError::Unavailable(format!("{} not stubbed", issue_key)))
    }

    fn issue_link(&self, issue_key: &str) -> String {
        format!("https://jira.test/browse/{}", issue_key)
    }
}

/// Lookup that always fails
pub struct DownLookup;

#[async_trait]
impl IssueLookup for DownLookup {
    async fn fetch_issue(&self, _issue_key: &str) -> Result<IssueDetail, LookupError> {
        Err(LookupError::Unavailable("connection refused".to_string()))
    }
}

/// Create a test app around the given lookup
pub fn create_test_app(lookup: Arc<dyn IssueLookup>, default_mode: AggregationMode) -> (Router, AppState) {
    let state = AppState::new(
        ReferenceExtractor::default(),
        lookup,
        default_mode,
        Duration::from_secs(60),
    );
    (jrep_export::build_router(state.clone()), state)
}

/// Send a request through a fresh clone of the router
pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

pub fn post_form(uri: &str, fields: &[(&str, &str)]) -> Request<Body> {
    let body = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(fields)
        .finish();

    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Parse the `progress` events out of a complete SSE body
pub fn parse_sse(body: &[u8]) -> Vec<ProgressEvent> {
    let text = String::from_utf8_lossy(body);
    let mut events = Vec::new();
    for block in text.split("\n\n") {
        let is_progress = block.lines().any(|l| l == "event: progress");
        if !is_progress {
            continue;
        }
        let data: String = block
            .lines()
            .filter_map(|l| l.strip_prefix("data: ").or_else(|| l.strip_prefix("data:")))
            .collect();
        events.push(serde_json::from_str(&data).unwrap());
    }
    events
}

/// Assert the progress contract: non-decreasing, one terminal 100% event last
pub fn assert_progress_contract(events: &[ProgressEvent]) {
    assert!(!events.is_empty(), "no progress events received");
    let percents: Vec<u8> = events.iter().map(|e| e.progress).collect();
    assert!(
        percents.windows(2).all(|w| w[0] <= w[1]),
        "progress not monotonic: {:?}",
        percents
    );
    assert_eq!(events.iter().filter(|e| e.complete).count(), 1);
    let last = events.last().unwrap();
    assert!(last.complete);
    assert_eq!(last.progress, 100);
    assert!(last.result_handle.is_some());
    assert_eq!(last.filename.as_deref(), Some("manual_jira_report.csv"));
}
