//! Job progress events and the per-job progress channel
//!
//! A job emits `progress: 0` before any work, one event each time the
//! integer percentage advances, and exactly one terminal event with
//! `complete: true` and `progress: 100` carrying the report handle. The
//! last line already reports 100, so a non-empty job ends `100, 100`.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// A single progress notification for one job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Percentage complete (0 - 100)
    pub progress: u8,

    /// Set only on the terminal event
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub complete: bool,

    /// Token exchanged once for the finished report
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_handle: Option<String>,

    /// Suggested download filename
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl ProgressEvent {
    /// Intermediate event
    pub fn progress(percent: u8) -> Self {
        Self {
            progress: percent.min(100),
            complete: false,
            result_handle: None,
            filename: None,
        }
    }

    /// Terminal event
    pub fn completed(result_handle: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            progress: 100,
            complete: true,
            result_handle: Some(result_handle.into()),
            filename: Some(filename.into()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.complete
    }
}

/// Converts "line N of T consumed" into integer percentages
///
/// `advance` returns a percentage only when it differs from the last one
/// reported, so emitted values are strictly increasing.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total: usize,
    done: usize,
    last_reported: Option<u8>,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            done: 0,
            last_reported: None,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// `floor(done / total * 100)`; 100 for an empty job
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        let done = self.done.min(self.total) as u64;
        ((done * 100) / self.total as u64) as u8
    }

    /// Mark the start of work. Returns `Some(0)` unless the job is empty.
    pub fn start(&mut self) -> Option<u8> {
        if self.total == 0 {
            return None;
        }
        self.report(0)
    }

    /// Record one more consumed line
    pub fn advance(&mut self) -> Option<u8> {
        self.done = (self.done + 1).min(self.total);
        let percent = self.percent();
        self.report(percent)
    }

    fn report(&mut self, percent: u8) -> Option<u8> {
        match self.last_reported {
            Some(last) if last >= percent => None,
            _ => {
                self.last_reported = Some(percent);
                Some(percent)
            }
        }
    }
}

/// Producer half of a job's progress queue
#[derive(Debug, Clone)]
pub struct ProgressSender {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

/// Consumer half of a job's progress queue
#[derive(Debug)]
pub struct ProgressReceiver {
    rx: mpsc::UnboundedReceiver<ProgressEvent>,
}

/// The consumer has gone away
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("progress subscriber disconnected")]
pub struct Disconnected;

/// Create an unbounded, order-preserving queue owned by one job
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ProgressSender { tx }, ProgressReceiver { rx })
}

impl ProgressSender {
    /// Push an event; fails once the receiver has been dropped
    pub fn send(&self, event: ProgressEvent) -> Result<(), Disconnected> {
        self.tx.send(event).map_err(|_| Disconnected)
    }
}

impl ProgressReceiver {
    /// Next event, or `None` once the producer is gone and the queue is drained
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.rx.recv().await
    }
}
