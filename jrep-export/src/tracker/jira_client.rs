//! Jira REST client
//!
//! Fetches `GET {base_url}/rest/api/3/issue/{key}` with HTTP Basic auth and
//! reduces the nested issue record to an [`IssueDetail`].
//!
//! # Latest approval
//! The approval history lives in a custom field (default
//! `customfield_10027`). Only entries whose `finalDecision` is `"approved"`
//! count. Their `completedDate.jira` strings are compared lexicographically
//! and a later entry wins only when strictly greater, so ties keep the
//! earlier entry and the first approver listed in it. Dates are not parsed.

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use super::{IssueDetail, IssueLookup, LookupError};
use jrep_common::config::TrackerConfig;
use jrep_common::{Error, Result};

/// User-Agent header sent with every request
const USER_AGENT: &str = concat!("jrep-export/", env!("CARGO_PKG_VERSION"));

/// Decision value of an approval entry that counts
const APPROVED: &str = "approved";

/// Jira REST client
pub struct JiraClient {
    http_client: Client,
    base_url: Option<String>,
    user: Option<String>,
    api_token: Option<String>,
    approvals_field: String,
}

impl JiraClient {
    /// Create a client from tracker settings
    ///
    /// A missing base URL is accepted; every lookup then fails with
    /// [`LookupError::Unavailable`].
    pub fn new(config: &TrackerConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static(USER_AGENT),
        );

        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: config.normalized_base_url(),
            user: config.user.clone(),
            api_token: config.api_token.clone(),
            approvals_field: config.approvals_field.clone(),
        })
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    async fn query_issue(&self, issue_key: &str) -> std::result::Result<IssueResponse, LookupError> {
        let base_url = self.base_url.as_deref().ok_or_else(|| {
            LookupError::Unavailable("tracker base URL not configured".to_string())
        })?;

        let url = format!("{}/rest/api/3/issue/{}", base_url, issue_key);
        debug!(issue_key = %issue_key, url = %url, "Querying issue tracker");

        let mut request = self.http_client.get(&url);
        if let Some(user) = &self.user {
            request = request.basic_auth(user, self.api_token.as_ref());
        }

        let response = request
            .send()
            .await
            .map_err(|e| LookupError::Unavailable(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Unavailable(format!(
                "tracker returned {} for {}",
                status, issue_key
            )));
        }

        response
            .json::<IssueResponse>()
            .await
            .map_err(|e| LookupError::Malformed(format!("{}: {}", issue_key, e)))
    }

    fn reduce(&self, issue_key: &str, issue: IssueResponse) -> IssueDetail {
        let fields = issue.fields;

        let approvals = match fields.extra.get(&self.approvals_field) {
            None | Some(Value::Null) => Vec::new(),
            Some(value) => match Vec::<ApprovalEntry>::deserialize(value) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(
                        issue_key = %issue_key,
                        field = %self.approvals_field,
                        error = %e,
                        "Unexpected approvals field shape, ignoring approvals"
                    );
                    Vec::new()
                }
            },
        };

        let (latest_approver, latest_approval_time) = select_latest_approval(&approvals);

        IssueDetail {
            assignee: display_name(&fields.assignee),
            reporter: display_name(&fields.reporter),
            created: fields.created.unwrap_or_default(),
            latest_approver,
            latest_approval_time,
        }
    }
}

#[async_trait]
impl IssueLookup for JiraClient {
    async fn fetch_issue(&self, issue_key: &str) -> std::result::Result<IssueDetail, LookupError> {
        let issue = self.query_issue(issue_key).await?;
        let detail = self.reduce(issue_key, issue);

        debug!(
            issue_key = %issue_key,
            assignee = %detail.assignee,
            approver = %detail.latest_approver,
            "Issue lookup complete"
        );

        Ok(detail)
    }

    fn issue_link(&self, issue_key: &str) -> String {
        match &self.base_url {
            Some(base) => format!("{}/browse/{}", base, issue_key),
            None => String::new(),
        }
    }
}

/// Pick `(approver, completed date)` of the latest approved entry
///
/// Returns empty strings when nothing qualifies.
pub fn select_latest_approval(entries: &[ApprovalEntry]) -> (String, String) {
    let mut latest_approver = String::new();
    let mut latest_date = String::new();

    for entry in entries {
        if entry.final_decision.as_deref() != Some(APPROVED) {
            continue;
        }
        let completed = entry
            .completed_date
            .as_ref()
            .and_then(|d| d.jira.as_deref())
            .unwrap_or("");

        for approver in entry.approvers.iter().flatten() {
            if completed > latest_date.as_str() {
                latest_date = completed.to_string();
                latest_approver = display_name(&approver.approver);
            }
        }
    }

    (latest_approver, latest_date)
}

fn display_name(user: &Option<JiraUser>) -> String {
    user.as_ref()
        .and_then(|u| u.display_name.clone())
        .unwrap_or_default()
}

// ============================================================================
// Jira API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct IssueResponse {
    #[serde(default)]
    fields: IssueFields,
}

#[derive(Debug, Default, Deserialize)]
struct IssueFields {
    #[serde(default)]
    assignee: Option<JiraUser>,
    #[serde(default)]
    reporter: Option<JiraUser>,
    #[serde(default)]
    created: Option<String>,
    /// Custom fields, including the approvals field
    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

/// User object as returned by Jira
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JiraUser {
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
}

/// One element of the approvals custom field
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApprovalEntry {
    #[serde(rename = "finalDecision", default)]
    pub final_decision: Option<String>,
    #[serde(rename = "completedDate", default)]
    pub completed_date: Option<CompletedDate>,
    #[serde(default)]
    pub approvers: Option<Vec<ApproverEntry>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletedDate {
    #[serde(default)]
    pub jira: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApproverEntry {
    #[serde(default)]
    pub approver: Option<JiraUser>,
}

// ============================================================================
// Tests
// ============================================================================
