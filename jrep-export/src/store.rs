//! Single-use store for finished reports
//!
//! Reports are kept in memory under a random token. `take` removes the
//! entry, so a handle can be redeemed once. Entries older than the
//! retention window are purged on every access.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

/// A finished, not yet downloaded report
#[derive(Debug, Clone)]
pub struct StoredReport {
    pub filename: String,
    pub content: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

/// In-memory report store shared across handlers
#[derive(Clone)]
pub struct ReportStore {
    reports: Arc<Mutex<HashMap<String, StoredReport>>>,
    retention: Duration,
}

impl ReportStore {
    pub fn new(retention: Duration) -> Self {
        Self {
            reports: Arc::new(Mutex::new(HashMap::new())),
            retention,
        }
    }

    /// Store a report and return its retrieval handle
    pub async fn insert(&self, filename: impl Into<String>, content: Vec<u8>) -> String {
        let handle = Uuid::new_v4().simple().to_string();
        let report = StoredReport {
            filename: filename.into(),
            content,
            created_at: Utc::now(),
        };

        let mut reports = self.reports.lock().await;
        self.purge_expired(&mut reports);
        debug!(handle = %handle, bytes = report.content.len(), "Report stored");
        reports.insert(handle.clone(), report);
        handle
    }

    /// Remove and return a report; `None` if unknown, expired or already taken
    pub async fn take(&self, handle: &str) -> Option<StoredReport> {
        let mut reports = self.reports.lock().await;
        self.purge_expired(&mut reports);
        reports.remove(handle)
    }

    /// Number of reports currently held
    pub async fn len(&self) -> usize {
        self.reports.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn purge_expired(&self, reports: &mut HashMap<String, StoredReport>) {
        let now = Utc::now();
        let before = reports.len();
        reports.retain(|_, report| {
            now.signed_duration_since(report.created_at)
                .to_std()
                .map(|age| age <= self.retention)
                .unwrap_or(true)
        });
        let purged = before - reports.len();
        if purged > 0 {
            info!(purged, "Purged expired reports");
        }
    }
}
