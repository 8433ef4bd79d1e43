//! Issue tracker lookups
//!
//! An [`IssueLookup`] turns an issue key into a flat [`IssueDetail`].
//! Lookup failures never abort a job: [`fetch_or_default`] logs them and
//! substitutes an empty detail.

pub mod jira_client;

pub use jira_client::{select_latest_approval, JiraClient};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Flattened issue metadata used in reports
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueDetail {
    pub assignee: String,
    pub reporter: String,
    pub created: String,
    pub latest_approver: String,
    pub latest_approval_time: String,
}

/// Lookup failure
#[derive(Debug, Error)]
pub enum LookupError {
    /// Transport failure, timeout or non-success status
    #[error("Issue tracker unavailable: {0}")]
    Unavailable(String),

    /// Response body could not be decoded
    #[error("Malformed tracker response: {0}")]
    Malformed(String),
}

/// Source of issue metadata
#[async_trait]
pub trait IssueLookup: Send + Sync {
    /// Fetch and flatten one issue
    async fn fetch_issue(&self, issue_key: &str) -> Result<IssueDetail, LookupError>;

    /// Browser link for an issue, if the lookup knows its deployment URL
    fn issue_link(&self, _issue_key: &str) -> String {
        String::new()
    }
}

/// Fetch an issue, substituting an empty detail on failure
pub async fn fetch_or_default(lookup: &dyn IssueLookup, issue_key: &str) -> IssueDetail {
    match lookup.fetch_issue(issue_key).await {
        Ok(detail) => detail,
        Err(e) => {
            warn!(issue_key = %issue_key, error = %e, "Issue lookup failed, using empty metadata");
            IssueDetail::default()
        }
    }
}
