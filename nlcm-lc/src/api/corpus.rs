//! Training corpus endpoint
//!
//! Lets other agents teach the classifier a new phrase. The append changes
//! the corpus modification time, so the next reconciliation cycle trains a
//! replacement classifier.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use nlcm_common::events::LifecycleEvent;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::corpus::{normalize_label, TrainingCorpus};
use crate::{ApiError, ApiResult, AppState};

/// POST /corpus/examples request body
#[derive(Debug, Deserialize)]
pub struct AppendExampleRequest {
    pub text: String,
    pub label: String,
}

/// POST /corpus/examples response body
#[derive(Debug, Serialize)]
pub struct AppendExampleResponse {
    pub label: String,
    pub corpus_examples: usize,
}

/// POST /corpus/examples
pub async fn append_example(
    State(state): State<AppState>,
    Json(request): Json<AppendExampleRequest>,
) -> ApiResult<(StatusCode, Json<AppendExampleResponse>)> {
    let label = normalize_label(&request.label);
    let corpus: Arc<TrainingCorpus> = Arc::clone(&state.corpus);

    let corpus_examples = tokio::task::spawn_blocking(move || {
        corpus.append(&request.text, &request.label)?;
        corpus.example_count()
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Corpus append task failed: {}", e)))??;

    info!("Corpus now holds {} examples", corpus_examples);

    state.event_bus.emit_lossy(LifecycleEvent::CorpusExampleAppended {
        label: label.clone(),
        timestamp: chrono::Utc::now(),
    });

    Ok((
        StatusCode::CREATED,
        Json(AppendExampleResponse {
            label,
            corpus_examples,
        }),
    ))
}

pub fn corpus_routes() -> Router<AppState> {
    Router::new().route("/corpus/examples", post(append_example))
}
