use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use metrics::counter;
use serde::{Deserialize, Serialize};

use embedding::{CacheStats, Usage};

use crate::error::{ServerError, ServerResult};
use crate::state::ServerState;

/// Request to embed a batch of texts
#[derive(Debug, Deserialize)]
pub struct EmbedRequest {
    pub texts: Vec<String>,

    /// Model override (optional, defaults to the configured model)
    #[serde(default)]
    pub model: Option<String>,
}

/// Response for a batch embedding request
#[derive(Debug, Serialize)]
pub struct EmbedResponse {
    pub embeddings: Vec<Vec<f32>>,
    pub model: String,
    pub usage: Usage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_stats: Option<CacheStats>,
    pub substituted: usize,
}

/// Request to embed a single text
#[derive(Debug, Deserialize)]
pub struct EmbedSingleRequest {
    pub text: String,

    #[serde(default)]
    pub model: Option<String>,
}

/// Response for a single embedding request
#[derive(Debug, Serialize)]
pub struct EmbedSingleResponse {
    pub embedding: Vec<f32>,
    pub model: String,
    pub dimensions: usize,
}

/// POST /api/v1/embed — embed a batch of texts.
///
/// The response is index-aligned with the request: `embeddings[i]` is the
/// vector for `texts[i]`, even when individual items had to be retried or
/// zero-filled.
pub async fn embed_batch(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<EmbedRequest>,
) -> ServerResult<impl IntoResponse> {
    if request.texts.is_empty() {
        return Err(ServerError::BadRequest("texts must not be empty".into()));
    }
    if request.texts.iter().any(|t| t.trim().is_empty()) {
        return Err(ServerError::BadRequest(
            "texts must not contain empty entries".into(),
        ));
    }

    let model = request
        .model
        .clone()
        .unwrap_or_else(|| state.embeddings.config().model.clone());

    let result = state
        .embeddings
        .process_with_model(&request.texts, request.model.as_deref())
        .await?;

    counter!("aigate_embedded_texts_total").increment(request.texts.len() as u64);
    if result.substituted > 0 {
        counter!("aigate_embedding_zero_fills_total").increment(result.substituted as u64);
    }

    Ok(Json(EmbedResponse {
        embeddings: result.vectors,
        model,
        usage: result.usage,
        cache_stats: result.cache_stats,
        substituted: result.substituted,
    }))
}

/// POST /api/v1/embed/single — embed one text.
pub async fn embed_single(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<EmbedSingleRequest>,
) -> ServerResult<impl IntoResponse> {
    if request.text.trim().is_empty() {
        return Err(ServerError::BadRequest("text must not be empty".into()));
    }

    let model = request
        .model
        .clone()
        .unwrap_or_else(|| state.embeddings.config().model.clone());

    let embedding = state
        .embeddings
        .embed_single(&request.text, request.model.as_deref())
        .await?;

    counter!("aigate_embedded_texts_total").increment(1);

    let dimensions = embedding.len();
    Ok(Json(EmbedSingleResponse {
        embedding,
        model,
        dimensions,
    }))
}
