//! AI Gateway Server - HTTP surface for the streaming relay and embeddings
//!
//! This crate exposes the gateway over HTTP:
//!
//! - **Streaming relay**: `/api/v1/generate/stream` and
//!   `/api/v1/search/stream` relay the upstream provider's event feed as
//!   SSE, with model-tier fallback at stream open.
//! - **Embeddings**: `/api/v1/embed` and `/api/v1/embed/single` run batched
//!   embedding requests with positional-integrity guarantees.
//! - **Health & Metrics**: liveness/readiness probes and Prometheus metrics.
//!
//! # Features
//!
//! - **Authentication**: API key-based authentication with rate limiting
//! - **Middleware**: CORS, request ID tracking, structured logging
//! - **Configuration**: `gateway.*` files and `AIGATE__*` env variables
//! - **Error Handling**: structured error responses with error codes
//! - **Graceful Shutdown**: SIGTERM/Ctrl+C handling
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use server::GatewayConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = GatewayConfig::load()?;
//!     server::start_server(config).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use config::{GatewayConfig, HttpConfig};
pub use error::{ServerError, ServerResult};
pub use server::{build_router, start_server};
pub use state::ServerState;
