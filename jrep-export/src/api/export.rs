//! Export API handlers
//!
//! POST /export, POST /jobs, GET /reports/:handle

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::Deserialize;

use crate::{
    error::{ApiError, ApiResult},
    job::{aggregate_text, start_job, JobSummary},
    report::{render_csv, REPORT_CONTENT_TYPE, REPORT_FILENAME},
    AppState,
};
use jrep_common::AggregationMode;

/// Log submission (form or JSON body)
#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    #[serde(default)]
    pub log_text: String,
    /// Aggregation mode; the configured default when omitted
    #[serde(default)]
    pub mode: Option<AggregationMode>,
}

impl ExportRequest {
    pub fn mode_or(&self, default_mode: AggregationMode) -> AggregationMode {
        self.mode.unwrap_or(default_mode)
    }
}

/// POST /export
///
/// Aggregate synchronously and return the CSV as an attachment.
pub async fn export_csv(
    State(state): State<AppState>,
    Form(request): Form<ExportRequest>,
) -> ApiResult<Response> {
    let mode = request.mode_or(state.default_mode);
    tracing::info!(mode = %mode, bytes = request.log_text.len(), "Synchronous export requested");

    let report = aggregate_text(&state.jobs_ctx, mode, &request.log_text).await;
    let csv = render_csv(&report)?;

    tracing::info!(mode = %mode, rows = report.len(), "Synchronous export complete");
    Ok(csv_attachment(REPORT_FILENAME, csv))
}

/// POST /jobs
///
/// Start a background job. Returns 202 Accepted with the job id; progress
/// is read from GET /jobs/:job_id/events.
pub async fn start_export_job(
    State(state): State<AppState>,
    Json(request): Json<ExportRequest>,
) -> ApiResult<(StatusCode, Json<JobSummary>)> {
    let mode = request.mode_or(state.default_mode);
    let summary = start_job(state.jobs_ctx.clone(), &state.jobs, mode, request.log_text).await;

    tracing::info!(
        job_id = %summary.job_id,
        mode = %summary.mode,
        total_lines = summary.total_lines,
        "Export job started"
    );

    Ok((StatusCode::ACCEPTED, Json(summary)))
}

/// GET /reports/:handle
///
/// Single-use download; the report is deleted once served.
pub async fn download_report(
    State(state): State<AppState>,
    Path(handle): Path<String>,
) -> ApiResult<Response> {
    let report = state
        .reports()
        .take(&handle)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Report not found: {}", handle)))?;

    tracing::info!(handle = %handle, bytes = report.content.len(), "Report downloaded");
    Ok(csv_attachment(&report.filename, report.content))
}

fn csv_attachment(filename: &str, content: Vec<u8>) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, REPORT_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        content,
    )
        .into_response()
}

/// Build export routes
pub fn export_routes() -> Router<AppState> {
    Router::new()
        .route("/export", post(export_csv))
        .route("/export/stream", post(super::sse::export_event_stream))
        .route("/jobs", post(start_export_job))
        .route("/jobs/:job_id/events", get(super::sse::job_event_stream))
        .route("/reports/:handle", get(download_report))
}
