//! nlcm-lc library - classifier lifecycle manager
//!
//! Keeps exactly one remote text classifier trained on the current local
//! corpus: selects the newest available classifier, trains a new one when
//! the corpus changes and deletes superseded ones.

pub mod api;
pub mod config;
pub mod corpus;
pub mod error;
pub mod policy;
pub mod reconciler;
pub mod registry;
pub mod service;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use corpus::TrainingCorpus;
use nlcm_common::events::EventBus;
use reconciler::ReconcilerStatus;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Latest reconciler status (read only from handlers)
    pub status_rx: watch::Receiver<ReconcilerStatus>,
    /// Corpus written by `POST /corpus/examples`
    pub corpus: Arc<TrainingCorpus>,
    /// Lifecycle event broadcaster
    pub event_bus: EventBus,
    /// Server start time, for uptime reporting
    pub startup_time: DateTime<Utc>,
    /// Cancelled on process shutdown; ends open SSE streams
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        status_rx: watch::Receiver<ReconcilerStatus>,
        corpus: Arc<TrainingCorpus>,
        event_bus: EventBus,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            status_rx,
            corpus,
            event_bus,
            startup_time: Utc::now(),
            shutdown,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::status_routes())
        .merge(api::corpus_routes())
        .merge(api::sse_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
