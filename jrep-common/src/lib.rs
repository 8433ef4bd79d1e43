//! # jrep Common Library
//!
//! Shared code for the jrep build-log report service:
//! - Error type
//! - Configuration loading (TOML file + environment)
//! - Aggregation mode
//! - Job progress events, per-job progress channel and SSE encoding

pub mod config;
pub mod error;
pub mod progress;
pub mod sse;
pub mod types;

pub use error::{Error, Result};
pub use progress::{progress_channel, ProgressEvent, ProgressReceiver, ProgressSender};
pub use types::AggregationMode;
