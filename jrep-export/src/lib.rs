//! jrep-export library interface
//!
//! Turns build-log text into a per-build CSV report of referenced issues,
//! enriched from the issue tracker, with streamed progress.

pub mod aggregator;
pub mod api;
pub mod config;
pub mod error;
pub mod extract;
pub mod job;
pub mod report;
pub mod store;
pub mod tracker;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

use crate::extract::ReferenceExtractor;
use crate::job::{JobContext, JobRegistry};
use crate::store::ReportStore;
use crate::tracker::IssueLookup;
use jrep_common::AggregationMode;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Extractor, tracker lookup and report store handed to every job
    pub jobs_ctx: JobContext,
    /// Background jobs awaiting their progress subscriber
    pub jobs: JobRegistry,
    /// Mode used when a request does not name one
    pub default_mode: AggregationMode,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        extractor: ReferenceExtractor,
        lookup: Arc<dyn IssueLookup>,
        default_mode: AggregationMode,
        retention: Duration,
    ) -> Self {
        Self {
            jobs_ctx: JobContext {
                extractor,
                lookup,
                reports: ReportStore::new(retention),
            },
            jobs: JobRegistry::new(retention),
            default_mode,
            startup_time: Utc::now(),
        }
    }

    pub fn reports(&self) -> &ReportStore {
        &self.jobs_ctx.reports
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // UI routes (HTML pages)
        .merge(api::ui_routes())
        // API routes
        .merge(api::export_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
