use crate::config::GatewayConfig;
use crate::error::ServerResult;
use dashmap::DashMap;
use embedding::BatchProcessor;
use metrics_exporter_prometheus::PrometheusHandle;
use relay::ChatUpstream;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct ServerState {
    /// Gateway configuration, immutable after startup
    pub config: Arc<GatewayConfig>,

    /// Rate limit tracking: API key -> (count, window_start)
    pub rate_limiter: Arc<DashMap<String, (u32, std::time::Instant)>>,

    /// Upstream chat/search client (shared across requests)
    pub chat: Arc<ChatUpstream>,

    /// Batch embedding processor (shared across requests)
    pub embeddings: Arc<BatchProcessor>,

    /// Prometheus render handle, present when metrics are enabled
    pub metrics: Option<PrometheusHandle>,
}

impl ServerState {
    /// Create new server state
    pub fn new(config: GatewayConfig, metrics: Option<PrometheusHandle>) -> ServerResult<Self> {
        let chat = Arc::new(ChatUpstream::new(config.upstream.clone())?);
        let embeddings = Arc::new(BatchProcessor::from_config(&config.embedding)?);

        Ok(Self {
            config: Arc::new(config),
            rate_limiter: Arc::new(DashMap::new()),
            chat,
            embeddings,
            metrics,
        })
    }

    /// Check if API key is valid
    pub fn is_valid_api_key(&self, key: &str) -> bool {
        self.config.http.api_keys.contains(key)
    }

    /// Check rate limit for API key
    pub fn check_rate_limit(&self, key: &str) -> bool {
        let now = std::time::Instant::now();
        let window = std::time::Duration::from_secs(60);
        let limit = self.config.http.rate_limit_per_minute;

        let mut entry = self.rate_limiter.entry(key.to_string()).or_insert((0, now));
        let (count, window_start) = entry.value_mut();

        // Reset if window has passed
        if now.duration_since(*window_start) > window {
            *count = 0;
            *window_start = now;
        }

        // Check limit
        if *count >= limit {
            return false;
        }

        *count += 1;
        true
    }
}

/// Server metadata for health checks
#[derive(Debug, serde::Serialize)]
pub struct ServerMetadata {
    pub version: String,
    pub uptime_seconds: u64,
}
