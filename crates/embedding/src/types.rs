use serde::{Deserialize, Serialize};

/// Accumulated usage across a batch call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub total_tokens: u64,
    /// Best-effort running cost. A batch whose response omits a cost field
    /// contributes zero rather than failing the operation.
    pub cost_usd: f64,
}

/// Local cache statistics for one batch call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

/// Result of a batch embedding call.
///
/// Invariant: `vectors.len()` equals the input length and `vectors[i]`
/// corresponds to input `i`, under every failure pattern.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub vectors: Vec<Vec<f32>>,
    pub usage: Usage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_stats: Option<CacheStats>,
    /// Positions filled with a zero vector after every retry tier failed.
    pub substituted: usize,
}

// ── Backend wire contract ───────────────────────────────────────────────
// Request: { "texts": [...], "model": "..." }
// Response: { "data": [{"embedding": [...]}], "usage": {...}, "cache_stats": {...} }

#[derive(Debug, Deserialize)]
pub struct EmbedResponseWire {
    pub data: Vec<EmbeddingItemWire>,
    #[serde(default)]
    pub usage: Option<UsageWire>,
    #[serde(default)]
    pub cache_stats: Option<CacheStatsWire>,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingItemWire {
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct UsageWire {
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default)]
    pub cost: Option<f64>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CacheStatsWire {
    #[serde(default)]
    pub hits: u64,
    #[serde(default)]
    pub misses: u64,
    #[serde(default)]
    pub hit_rate: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_response_full() {
        let raw = r#"{
            "data": [{"embedding": [0.1, 0.2]}, {"embedding": [0.3, 0.4]}],
            "usage": {"total_tokens": 42, "cost": 0.0005},
            "cache_stats": {"hits": 1, "misses": 1, "hit_rate": 0.5}
        }"#;
        let wire: EmbedResponseWire = serde_json::from_str(raw).unwrap();
        assert_eq!(wire.data.len(), 2);
        assert_eq!(wire.data[1].embedding, vec![0.3, 0.4]);
        assert_eq!(wire.usage.unwrap().total_tokens, 42);
        assert_eq!(wire.cache_stats.unwrap().hits, 1);
    }

    #[test]
    fn wire_response_minimal() {
        // usage and cache_stats are optional, cost is optional within usage
        let raw = r#"{"data": [{"embedding": [1.0]}], "usage": {"total_tokens": 7}}"#;
        let wire: EmbedResponseWire = serde_json::from_str(raw).unwrap();
        assert!(wire.cache_stats.is_none());
        let usage = wire.usage.unwrap();
        assert_eq!(usage.total_tokens, 7);
        assert!(usage.cost.is_none());
    }

    #[test]
    fn batch_result_serializes_without_empty_cache_stats() {
        let result = BatchResult {
            vectors: vec![vec![0.0; 2]],
            usage: Usage::default(),
            cache_stats: None,
            substituted: 0,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("cache_stats").is_none());
        assert_eq!(json["substituted"], 0);
    }
}
