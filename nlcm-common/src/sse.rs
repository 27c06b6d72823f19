//! Server-Sent Events (SSE) utilities
//!
//! Shared SSE implementation for NLCM modules.

use crate::events::EventBus;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Create an SSE stream forwarding every lifecycle event on the bus
///
/// Sends a `ConnectionStatus` event first, then one SSE event per
/// `LifecycleEvent` (event name = variant name, data = JSON). A heartbeat
/// comment keeps idle connections open. The stream ends when the bus closes
/// or `shutdown` is cancelled, so graceful server shutdown is not held up by
/// connected clients.
///
/// # Example
/// ```rust,ignore
/// pub async fn event_stream(
///     State(state): State<AppState>,
/// ) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
///     nlcm_common::sse::lifecycle_event_stream(&state.event_bus, state.shutdown.clone(), "nlcm-lc")
/// }
/// ```
pub fn lifecycle_event_stream(
    event_bus: &EventBus,
    shutdown: CancellationToken,
    service_name: &'static str,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to {} lifecycle events", service_name);

    let mut rx = event_bus.subscribe();

    let stream = async_stream::stream! {
        yield Ok(Event::default()
            .event("ConnectionStatus")
            .data("connected"));

        loop {
            let received = tokio::select! {
                _ = shutdown.cancelled() => None,
                received = rx.recv() => Some(received),
            };
            let Some(received) = received else {
                info!("SSE: {} shutting down, closing stream", service_name);
                break;
            };

            match received {
                Ok(event) => {
                    let event_type = event.event_type();
                    match serde_json::to_string(&event) {
                        Ok(event_json) => {
                            debug!("SSE: Broadcasting {}", event_type);
                            yield Ok(Event::default().event(event_type).data(event_json));
                        }
                        Err(e) => {
                            warn!("SSE: Failed to serialize event {}: {}", event_type, e);
                        }
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("SSE: {} client lagged, {} events dropped", service_name, skipped);
                }
                Err(RecvError::Closed) => {
                    info!("SSE: {} event bus closed", service_name);
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(HEARTBEAT_INTERVAL)
            .text("heartbeat"),
    )
}
