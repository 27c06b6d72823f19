//! Reconciler status endpoint

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;

use crate::reconciler::ReconcilerStatus;
use crate::{ApiError, ApiResult, AppState};

/// Reconciler status plus corpus facts
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub reconciler: ReconcilerStatus,
    pub corpus_path: String,
    pub corpus_examples: usize,
}

/// GET /status
///
/// Counting examples reads the corpus file, so it runs off the async workers.
pub async fn get_status(State(state): State<AppState>) -> ApiResult<Json<StatusResponse>> {
    let reconciler = state.status_rx.borrow().clone();
    let corpus = Arc::clone(&state.corpus);
    let corpus_examples = tokio::task::spawn_blocking(move || corpus.example_count())
        .await
        .map_err(|e| ApiError::Internal(format!("Corpus count task failed: {}", e)))??;

    Ok(Json(StatusResponse {
        reconciler,
        corpus_path: state.corpus.path().display().to_string(),
        corpus_examples,
    }))
}

pub fn status_routes() -> Router<AppState> {
    Router::new().route("/status", get(get_status))
}
