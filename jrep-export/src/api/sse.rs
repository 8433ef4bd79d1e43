//! Server-Sent Events (SSE) for export progress streaming

use crate::{api::export::ExportRequest, error::ApiResult, job::run_streaming, AppState};
use axum::{
    extract::{Path, State},
    response::sse::{Event, Sse},
    Form,
};
use futures::stream::Stream;
use jrep_common::sse::{progress_sse, receiver_stream};
use std::convert::Infallible;
use uuid::Uuid;

/// Service name used in SSE logging
const SERVICE_NAME: &str = "jrep-export";

/// GET /jobs/:job_id/events - progress of a background job
///
/// Drains the job's own queue until the terminal event. Only one
/// subscriber may claim a job (409 otherwise).
pub async fn job_event_stream(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let rx = state.jobs.subscribe(job_id).await?;
    tracing::info!(job_id = %job_id, "SSE client attached to job");
    Ok(progress_sse(SERVICE_NAME, receiver_stream(rx)))
}

/// POST /export/stream - run a job inline over the response stream
///
/// Closing the connection stops the job.
pub async fn export_event_stream(
    State(state): State<AppState>,
    Form(request): Form<ExportRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mode = request.mode_or(state.default_mode);
    progress_sse(
        SERVICE_NAME,
        run_streaming(state.jobs_ctx.clone(), mode, request.log_text),
    )
}
