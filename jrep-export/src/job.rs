//! Export jobs and their progress reporting
//!
//! A job runs the aggregator over one submitted log text and reports
//! progress in one of two ways:
//!
//! - Background worker ([`start_job`]): the job is spawned onto the runtime
//!   and pushes events into its own queue. The queue's receiver is parked in
//!   the [`JobRegistry`] until one SSE subscriber claims it.
//! - Inline generator ([`run_streaming`]): aggregation and event delivery are
//!   interleaved in the caller's stream; dropping the stream stops the job.
//!
//! Either way the sequence is `0`, strictly increasing percentages, then one
//! terminal event carrying the report handle. Empty input goes straight to
//! the terminal event.

use chrono::{DateTime, Utc};
use futures::stream::Stream;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::aggregator::{AggregateReport, BuildAggregator};
use crate::error::{ApiError, ApiResult};
use crate::extract::ReferenceExtractor;
use crate::report::{render_csv, REPORT_FILENAME};
use crate::store::ReportStore;
use crate::tracker::IssueLookup;
use jrep_common::progress::{progress_channel, Disconnected, ProgressTracker};
use jrep_common::{AggregationMode, ProgressEvent, ProgressReceiver, ProgressSender};

/// Shared collaborators of every job
#[derive(Clone)]
pub struct JobContext {
    pub extractor: ReferenceExtractor,
    pub lookup: Arc<dyn IssueLookup>,
    pub reports: ReportStore,
}

impl JobContext {
    fn aggregator(&self, mode: AggregationMode) -> BuildAggregator {
        BuildAggregator::new(mode, self.extractor.clone(), Arc::clone(&self.lookup))
    }
}

/// Job failure
#[derive(Debug, Error)]
pub enum JobError {
    /// The progress subscriber went away
    #[error("progress subscriber disconnected")]
    Cancelled,

    #[error("report rendering failed: {0}")]
    Render(#[from] csv::Error),
}

impl From<Disconnected> for JobError {
    fn from(_: Disconnected) -> Self {
        JobError::Cancelled
    }
}

/// Returned to the submitter of a background job
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub job_id: Uuid,
    pub mode: AggregationMode,
    pub total_lines: usize,
}

/// Aggregate a whole text without progress reporting
pub async fn aggregate_text(ctx: &JobContext, mode: AggregationMode, text: &str) -> AggregateReport {
    let mut aggregator = ctx.aggregator(mode);
    for line in text.lines() {
        aggregator.consume_line(line).await;
    }
    aggregator.finish()
}

/// Render a finished aggregation, store it and build the terminal event
async fn finalize(ctx: &JobContext, report: &AggregateReport) -> Result<ProgressEvent, JobError> {
    let csv = render_csv(report)?;
    let handle = ctx.reports.insert(REPORT_FILENAME, csv).await;
    Ok(ProgressEvent::completed(handle, REPORT_FILENAME))
}

/// Run one job to completion, pushing progress into `tx`
///
/// A failed send means the subscriber disconnected; the job stops there.
pub async fn run_job(
    ctx: JobContext,
    job_id: Uuid,
    mode: AggregationMode,
    text: String,
    tx: ProgressSender,
) -> Result<(), JobError> {
    let mut tracker = ProgressTracker::new(text.lines().count());
    let mut aggregator = ctx.aggregator(mode);

    info!(job_id = %job_id, mode = %mode, total_lines = tracker.total(), "Job started");

    if let Some(percent) = tracker.start() {
        tx.send(ProgressEvent::progress(percent))?;
    }

    for line in text.lines() {
        aggregator.consume_line(line).await;
        if let Some(percent) = tracker.advance() {
            debug!(job_id = %job_id, percent, "Job progress");
            tx.send(ProgressEvent::progress(percent))?;
        }
    }

    let lookups = aggregator.lookups_performed();
    let report = aggregator.finish();
    let terminal = finalize(&ctx, &report).await?;

    info!(job_id = %job_id, rows = report.len(), lookups, "Job complete");

    tx.send(terminal)?;
    Ok(())
}

/// Spawn a background job and register its progress queue
pub async fn start_job(
    ctx: JobContext,
    registry: &JobRegistry,
    mode: AggregationMode,
    text: String,
) -> JobSummary {
    let (tx, rx) = progress_channel();
    let total_lines = text.lines().count();
    let job_id = Uuid::new_v4();

    let task = tokio::spawn(async move {
        match run_job(ctx, job_id, mode, text, tx).await {
            Ok(()) => {
                info!(job_id = %job_id, "Background job task completed successfully");
            }
            Err(JobError::Cancelled) => {
                warn!(job_id = %job_id, "Progress subscriber disconnected, job stopped");
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Background job task failed");
            }
        }
    });
    registry.register(job_id, mode, rx, task).await;

    JobSummary {
        job_id,
        mode,
        total_lines,
    }
}

/// Run a job inline as a stream of progress events
///
/// Work only advances while the stream is polled; dropping it cancels the job.
pub fn run_streaming(
    ctx: JobContext,
    mode: AggregationMode,
    text: String,
) -> impl Stream<Item = ProgressEvent> + Send {
    async_stream::stream! {
        let job_id = Uuid::new_v4();
        let mut tracker = ProgressTracker::new(text.lines().count());
        let mut aggregator = ctx.aggregator(mode);

        info!(job_id = %job_id, mode = %mode, total_lines = tracker.total(), "Streaming job started");

        if let Some(percent) = tracker.start() {
            yield ProgressEvent::progress(percent);
        }

        for line in text.lines() {
            aggregator.consume_line(line).await;
            if let Some(percent) = tracker.advance() {
                yield ProgressEvent::progress(percent);
            }
        }

        let report = aggregator.finish();
        match finalize(&ctx, &report).await {
            Ok(terminal) => {
                info!(job_id = %job_id, rows = report.len(), "Streaming job complete");
                yield terminal;
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Streaming job failed");
            }
        }
    }
}

/// A registered background job
struct PendingJob {
    mode: AggregationMode,
    /// `None` once a subscriber has claimed the queue
    receiver: Option<ProgressReceiver>,
    task: JoinHandle<()>,
    created_at: DateTime<Utc>,
}

/// Background jobs keyed by id
///
/// Each job's queue has exactly one consumer: the first subscriber takes
/// the receiver, later subscribers are rejected. Entries are purged once
/// their task has finished and they are older than the retention window;
/// a running job is never purged.
#[derive(Clone)]
pub struct JobRegistry {
    jobs: Arc<Mutex<HashMap<Uuid, PendingJob>>>,
    retention: Duration,
}

impl JobRegistry {
    pub fn new(retention: Duration) -> Self {
        Self {
            jobs: Arc::new(Mutex::new(HashMap::new())),
            retention,
        }
    }

    /// Park a spawned job's receiver under its id
    pub async fn register(
        &self,
        job_id: Uuid,
        mode: AggregationMode,
        receiver: ProgressReceiver,
        task: JoinHandle<()>,
    ) {
        let mut jobs = self.jobs.lock().await;
        self.purge_expired(&mut jobs);
        jobs.insert(
            job_id,
            PendingJob {
                mode,
                receiver: Some(receiver),
                task,
                created_at: Utc::now(),
            },
        );
    }

    /// Claim a job's progress queue
    pub async fn subscribe(&self, job_id: Uuid) -> ApiResult<ProgressReceiver> {
        let mut jobs = self.jobs.lock().await;
        self.purge_expired(&mut jobs);

        let job = jobs
            .get_mut(&job_id)
            .ok_or_else(|| ApiError::NotFound(format!("Job not found: {}", job_id)))?;

        let receiver = job.receiver.take().ok_or_else(|| {
            ApiError::Conflict(format!("Job {} already has a progress subscriber", job_id))
        })?;

        debug!(job_id = %job_id, mode = %job.mode, "Progress subscriber attached");
        Ok(receiver)
    }

    /// Number of jobs currently tracked, claimed or not
    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }

    /// Number of jobs whose progress queue has not been claimed yet
    pub async fn unclaimed(&self) -> usize {
        self.jobs
            .lock()
            .await
            .values()
            .filter(|job| job.receiver.is_some())
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn purge_expired(&self, jobs: &mut HashMap<Uuid, PendingJob>) {
        let now = Utc::now();
        jobs.retain(|job_id, job| {
            let expired = now
                .signed_duration_since(job.created_at)
                .to_std()
                .map(|age| age > self.retention)
                .unwrap_or(false);
            if !expired || !job.task.is_finished() {
                return true;
            }
            info!(
                job_id = %job_id,
                claimed = job.receiver.is_none(),
                "Purging finished job past retention"
            );
            false
        });
    }
}
