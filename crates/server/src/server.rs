//! Server initialization and routing
//!
//! Axum server setup: router construction, middleware stack, metrics
//! recorder, and graceful shutdown.

use crate::config::GatewayConfig;
use crate::middleware::{api_key_auth, log_requests, request_id};
use crate::routes::{api_info, not_found};
use crate::routes::{embed, health, stream};
use crate::state::ServerState;
use axum::extract::DefaultBodyLimit;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

/// Build the Axum router with all routes and middleware
///
/// Routes are divided into:
/// - Public routes: /, /health, /ready, /metrics (no auth required)
/// - Protected routes: All /api/v1/* endpoints (API key required)
///
/// The SSE relay routes sit outside the timeout and compression layers:
/// a request timeout would sever a long-lived stream, and compression
/// buffers event flushes.
pub fn build_router(state: Arc<ServerState>) -> Router {
    let cors = if state.config.http.enable_cors {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
    };

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/", get(api_info))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics));

    // Streaming routes: auth, but no timeout/compression layers
    let stream_routes = Router::new()
        .route("/api/v1/generate/stream", post(stream::generate_stream))
        .route("/api/v1/search/stream", post(stream::search_stream))
        .layer(from_fn_with_state(state.clone(), api_key_auth));

    // Request/response routes: auth + timeout + compression
    let timed_routes = Router::new()
        .route("/api/v1/embed", post(embed::embed_batch))
        .route("/api/v1/embed/single", post(embed::embed_single))
        .route("/api/v1/metadata", get(health::server_metadata))
        .layer(from_fn_with_state(state.clone(), api_key_auth))
        .layer(TimeoutLayer::new(Duration::from_secs(
            state.config.http.timeout_secs,
        )))
        .layer(CompressionLayer::new());

    Router::new()
        .merge(public_routes)
        .merge(stream_routes)
        .merge(timed_routes)
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(state.config.http.max_body_size()))
        .layer(cors)
        .layer(from_fn(request_id))
        .layer(from_fn(log_requests))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server
///
/// Blocks until the server is shut down via SIGTERM or Ctrl+C.
pub async fn start_server(config: GatewayConfig) -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.http.log_level))
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .json()
        .init();

    // Install the metrics recorder before any counter is touched
    let metrics_handle = if config.http.metrics_enabled {
        Some(PrometheusBuilder::new().install_recorder()?)
    } else {
        None
    };

    // Create server state
    let state = Arc::new(ServerState::new(config.clone(), metrics_handle)?);

    // Build router
    let app = build_router(state);

    // Parse bind address
    let addr: SocketAddr = config.http.socket_addr()?;

    tracing::info!(
        "Starting AI gateway on {} with {} API keys",
        addr,
        config.http.api_keys.len()
    );
    tracing::info!(
        "Chat models: {} (primary) / {} (fallback)",
        config.upstream.model_main,
        config.upstream.model_fallback
    );
    tracing::info!(
        "Embedding model: {}, batch size {}, dim {}",
        config.embedding.model,
        config.embedding.batch_size,
        config.embedding.embedding_dim
    );
    tracing::info!(
        "Timeout: {}s (non-streaming), rate limit: {} requests/minute",
        config.http.timeout_secs,
        config.http.rate_limit_per_minute
    );

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Shutdown signal handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
