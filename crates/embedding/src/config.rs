use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use aigate::estimate::CostRates;

/// Embedding subsystem configuration. Immutable after startup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Primary (specialized) embedding endpoint.
    #[serde(default = "default_primary_url")]
    pub primary_url: String,
    /// Secondary endpoint used after primary failure; same wire contract.
    #[serde(default = "default_secondary_url")]
    pub secondary_url: String,
    #[serde(default)]
    pub primary_api_key: Option<String>,
    #[serde(default)]
    pub secondary_api_key: Option<String>,
    /// Default embedding model; requests may override it.
    #[serde(default = "default_model")]
    pub model: String,
    /// Texts per upstream batch request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Vector width; also the width of substituted zero vectors.
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,
    /// Timeout for a bulk (document) request.
    #[serde(default = "default_bulk_timeout_secs")]
    pub bulk_timeout_secs: u64,
    /// Timeout for a single-item (interactive) request.
    #[serde(default = "default_single_timeout_secs")]
    pub single_timeout_secs: u64,
    /// Pause between consecutive batches, to stay under upstream limits.
    #[serde(default = "default_inter_batch_delay_ms")]
    pub inter_batch_delay_ms: u64,
    /// Pause between per-item retries inside a failed batch.
    #[serde(default = "default_inter_item_delay_ms")]
    pub inter_item_delay_ms: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_cache_enabled")]
    pub cache_enabled: bool,
    #[serde(default = "default_cache_max_size")]
    pub cache_max_size: usize,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Pricing constants for best-effort cost accounting.
    #[serde(default)]
    pub rates: CostRates,
    /// Optional tokenizer.json for exact token counts.
    #[serde(default)]
    pub tokenizer_path: Option<PathBuf>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            primary_url: default_primary_url(),
            secondary_url: default_secondary_url(),
            primary_api_key: None,
            secondary_api_key: None,
            model: default_model(),
            batch_size: default_batch_size(),
            embedding_dim: default_embedding_dim(),
            bulk_timeout_secs: default_bulk_timeout_secs(),
            single_timeout_secs: default_single_timeout_secs(),
            inter_batch_delay_ms: default_inter_batch_delay_ms(),
            inter_item_delay_ms: default_inter_item_delay_ms(),
            connect_timeout_secs: default_connect_timeout_secs(),
            cache_enabled: default_cache_enabled(),
            cache_max_size: default_cache_max_size(),
            cache_ttl_secs: default_cache_ttl_secs(),
            rates: CostRates::default(),
            tokenizer_path: None,
        }
    }
}

impl EmbeddingConfig {
    pub fn bulk_timeout(&self) -> Duration {
        Duration::from_secs(self.bulk_timeout_secs)
    }

    pub fn single_timeout(&self) -> Duration {
        Duration::from_secs(self.single_timeout_secs)
    }

    pub fn inter_batch_delay(&self) -> Duration {
        Duration::from_millis(self.inter_batch_delay_ms)
    }

    pub fn inter_item_delay(&self) -> Duration {
        Duration::from_millis(self.inter_item_delay_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

fn default_primary_url() -> String {
    "https://openrouter.ai/api/v1/embeddings".to_string()
}

fn default_secondary_url() -> String {
    "https://openrouter.ai/api/v1/embeddings".to_string()
}

fn default_model() -> String {
    "baai/bge-m3".to_string()
}

fn default_batch_size() -> usize {
    50
}

fn default_embedding_dim() -> usize {
    1024
}

fn default_bulk_timeout_secs() -> u64 {
    60
}

fn default_single_timeout_secs() -> u64 {
    30
}

fn default_inter_batch_delay_ms() -> u64 {
    500
}

fn default_inter_item_delay_ms() -> u64 {
    300
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_max_size() -> usize {
    1000
}

fn default_cache_ttl_secs() -> u64 {
    3600
}
