//! HTTP API handlers for jrep-export
//!
//! REST submission and retrieval plus SSE progress streaming

pub mod export;
pub mod health;
pub mod sse;
pub mod ui;

pub use export::export_routes;
pub use health::health_routes;
pub use sse::{export_event_stream, job_event_stream};
pub use ui::ui_routes;
