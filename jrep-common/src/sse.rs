//! Server-Sent Events (SSE) utilities
//!
//! Turns a job's progress events into an SSE response. Each event is sent
//! as a discrete `progress` event whose data is the JSON-encoded
//! [`ProgressEvent`]; the stream ends after the terminal event.

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::progress::{ProgressEvent, ProgressReceiver};

/// SSE event name used for every progress notification
pub const PROGRESS_EVENT_NAME: &str = "progress";

/// Keep-alive comment interval
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Adapt a job's receiver into a stream that ends when the producer is gone
pub fn receiver_stream(mut rx: ProgressReceiver) -> impl Stream<Item = ProgressEvent> + Send {
    async_stream::stream! {
        while let Some(event) = rx.recv().await {
            yield event;
        }
    }
}

/// Encode one progress event for the wire
pub fn to_sse_event(event: &ProgressEvent) -> Result<Event, axum::Error> {
    Event::default().event(PROGRESS_EVENT_NAME).json_data(event)
}

/// Create an SSE response forwarding `events` until the terminal event
///
/// # Example
/// ```rust,ignore
/// let rx = state.jobs.subscribe(job_id).await?;
/// Ok(jrep_common::sse::progress_sse("jrep-export", receiver_stream(rx)))
/// ```
pub fn progress_sse<S>(
    service_name: &'static str,
    events: S,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    S: Stream<Item = ProgressEvent> + Send + 'static,
{
    info!("New SSE client connected to {} progress events", service_name);

    let stream = async_stream::stream! {
        let mut events = Box::pin(events);
        while let Some(event) = events.next().await {
            let terminal = event.is_terminal();
            match to_sse_event(&event) {
                Ok(sse_event) => {
                    debug!(progress = event.progress, complete = event.complete, "SSE: Forwarding progress");
                    yield Ok(sse_event);
                }
                Err(e) => {
                    warn!("SSE: Failed to serialize progress event: {}", e);
                }
            }
            if terminal {
                info!("SSE: {} progress stream complete", service_name);
                break;
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("heartbeat"),
    )
}
