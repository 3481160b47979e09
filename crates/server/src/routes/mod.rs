//! API route handlers
//!
//! - `health`: liveness, readiness, and metrics
//! - `stream`: SSE chat/search relay endpoints
//! - `embed`: batch and single embedding endpoints

pub mod embed;
pub mod health;
pub mod stream;

use crate::error::{ServerError, ServerResult};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

/// API version and base info
///
/// Root endpoint (GET /); requires no authentication.
pub async fn api_info() -> ServerResult<impl IntoResponse> {
    Ok(Json(json!({
        "name": "AI Gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "api_version": "v1",
        "endpoints": [
            "/api/v1/generate/stream",
            "/api/v1/search/stream",
            "/api/v1/embed",
            "/api/v1/embed/single",
            "/health",
            "/ready",
            "/metrics"
        ]
    })))
}

/// 404 Not Found handler
pub async fn not_found() -> ServerError {
    ServerError::NotFound
}
