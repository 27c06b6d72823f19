//! Server-Sent Events for lifecycle events

use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
    routing::get,
    Router,
};
use futures::stream::Stream;
use std::convert::Infallible;

/// GET /events - SSE stream of lifecycle events
///
/// Streams one event per selection switch, training submission and
/// completion, deletion and corpus append, plus a connection status event.
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    nlcm_common::sse::lifecycle_event_stream(&state.event_bus, state.shutdown.clone(), "nlcm-lc")
}

pub fn sse_routes() -> Router<AppState> {
    Router::new().route("/events", get(event_stream))
}
