//! Batch processor tests against scripted backends: the alignment law, the
//! degradation ladder, cache behavior, and cost accounting.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use aigate::estimate::TokenEstimator;
use aigate::fallback::TierError;
use embedding::backend::{BackendBatch, EmbeddingBackend};
use embedding::cache::EmbeddingCache;
use embedding::config::EmbeddingConfig;
use embedding::types::UsageWire;
use embedding::{BatchProcessor, EmbeddingError};

/// Deterministic vector for a text, so tests can assert content by value.
fn vector_for(text: &str, tag: f32) -> Vec<f32> {
    vec![text.len() as f32, tag]
}

#[derive(Default)]
struct Script {
    /// Batches (by exact text content) the bulk endpoint should fail.
    fail_batches: Vec<Vec<String>>,
    /// Fail every bulk call.
    fail_all_batches: bool,
    /// Texts the single-item endpoint should fail.
    fail_singles: Vec<String>,
    /// Reject (non-degradable) every bulk call.
    reject_batches: bool,
    /// Usage attached to successful bulk responses.
    usage: Option<UsageWire>,
}

struct MockBackend {
    name: &'static str,
    tag: f32,
    script: Script,
    batch_calls: AtomicUsize,
    single_calls: Mutex<Vec<String>>,
}

impl MockBackend {
    fn new(name: &'static str, tag: f32, script: Script) -> Arc<Self> {
        Arc::new(Self {
            name,
            tag,
            script,
            batch_calls: AtomicUsize::new(0),
            single_calls: Mutex::new(Vec::new()),
        })
    }

    fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingBackend for MockBackend {
    fn name(&self) -> &str {
        self.name
    }

    async fn embed_batch(&self, _model: &str, texts: &[String]) -> Result<BackendBatch, TierError> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if self.script.reject_batches {
            return Err(TierError::rejected(format!("{}: HTTP 401", self.name)));
        }
        if self.script.fail_all_batches
            || self.script.fail_batches.iter().any(|b| b == texts)
        {
            return Err(TierError::transient(format!("{}: HTTP 503", self.name)));
        }
        Ok(BackendBatch {
            vectors: texts.iter().map(|t| vector_for(t, self.tag)).collect(),
            usage: self.script.usage,
            cache_stats: None,
        })
    }

    async fn embed_single(&self, _model: &str, text: &str) -> Result<Vec<f32>, TierError> {
        self.single_calls.lock().unwrap().push(text.to_owned());
        if self.script.fail_singles.iter().any(|t| t == text) {
            return Err(TierError::transient(format!("{}: HTTP 503", self.name)));
        }
        Ok(vector_for(text, self.tag))
    }
}

fn test_config() -> EmbeddingConfig {
    EmbeddingConfig {
        batch_size: 2,
        embedding_dim: 4,
        inter_batch_delay_ms: 0,
        inter_item_delay_ms: 0,
        cache_enabled: false,
        ..Default::default()
    }
}

fn processor(
    primary: Arc<MockBackend>,
    secondary: Arc<MockBackend>,
    cfg: EmbeddingConfig,
) -> BatchProcessor {
    let cache = cfg
        .cache_enabled
        .then(|| EmbeddingCache::new(cfg.cache_max_size, cfg.cache_ttl()));
    BatchProcessor::new(
        primary,
        secondary,
        cache,
        TokenEstimator::approximate(),
        cfg,
    )
}

fn texts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn happy_path_is_aligned_and_primary_only() {
    let primary = MockBackend::new("primary", 1.0, Script::default());
    let secondary = MockBackend::new("secondary", 2.0, Script::default());
    let proc = processor(primary.clone(), secondary.clone(), test_config());

    let input = texts(&["a", "bb", "ccc"]);
    let result = proc.process(&input).await.unwrap();

    assert_eq!(result.vectors.len(), input.len());
    for (text, vector) in input.iter().zip(&result.vectors) {
        assert_eq!(vector, &vector_for(text, 1.0));
    }
    assert_eq!(result.substituted, 0);
    assert_eq!(secondary.batch_calls(), 0);
}

#[tokio::test]
async fn scenario_a_per_item_retry_keeps_alignment() {
    // texts=["a","b","c"], batchSize=2; both bulk tiers fail for ["c"];
    // secondary per-item retry for "c" succeeds.
    let primary = MockBackend::new(
        "primary",
        1.0,
        Script {
            fail_batches: vec![texts(&["c"])],
            ..Default::default()
        },
    );
    let secondary = MockBackend::new(
        "secondary",
        2.0,
        Script {
            fail_batches: vec![texts(&["c"])],
            ..Default::default()
        },
    );
    let proc = processor(primary.clone(), secondary.clone(), test_config());

    let input = texts(&["a", "b", "c"]);
    let result = proc.process(&input).await.unwrap();

    assert_eq!(result.vectors.len(), 3);
    assert_eq!(result.vectors[0], vector_for("a", 1.0));
    assert_eq!(result.vectors[1], vector_for("b", 1.0));
    assert_eq!(result.vectors[2], vector_for("c", 2.0));
    assert_eq!(result.substituted, 0);
    assert_eq!(*secondary.single_calls.lock().unwrap(), vec!["c".to_string()]);
}

#[tokio::test]
async fn fallback_uses_secondary_bulk_result() {
    let primary = MockBackend::new(
        "primary",
        1.0,
        Script {
            fail_all_batches: true,
            ..Default::default()
        },
    );
    let secondary = MockBackend::new("secondary", 2.0, Script::default());
    let proc = processor(primary.clone(), secondary.clone(), test_config());

    let input = texts(&["x", "y"]);
    let result = proc.process(&input).await.unwrap();

    assert_eq!(result.vectors[0], vector_for("x", 2.0));
    assert_eq!(result.vectors[1], vector_for("y", 2.0));
    assert_eq!(result.substituted, 0);
    assert_eq!(primary.batch_calls(), 1);
    assert_eq!(secondary.batch_calls(), 1);
}

#[tokio::test]
async fn alignment_law_under_total_failure() {
    // Everything fails: every position must still come back, zero-filled.
    let primary = MockBackend::new(
        "primary",
        1.0,
        Script {
            fail_all_batches: true,
            ..Default::default()
        },
    );
    let secondary = MockBackend::new(
        "secondary",
        2.0,
        Script {
            fail_all_batches: true,
            fail_singles: texts(&["a", "b", "c", "d", "e"]),
            ..Default::default()
        },
    );
    let cfg = test_config();
    let dim = cfg.embedding_dim;
    let proc = processor(primary, secondary, cfg);

    let input = texts(&["a", "b", "c", "d", "e"]);
    let result = proc.process(&input).await.unwrap();

    assert_eq!(result.vectors.len(), input.len());
    assert_eq!(result.substituted, input.len());
    for vector in &result.vectors {
        assert_eq!(vector, &vec![0.0; dim]);
    }
}

#[tokio::test]
async fn partial_item_failure_substitutes_only_that_position() {
    let primary = MockBackend::new(
        "primary",
        1.0,
        Script {
            fail_all_batches: true,
            ..Default::default()
        },
    );
    let secondary = MockBackend::new(
        "secondary",
        2.0,
        Script {
            fail_all_batches: true,
            fail_singles: texts(&["b"]),
            ..Default::default()
        },
    );
    let cfg = test_config();
    let dim = cfg.embedding_dim;
    let proc = processor(primary, secondary, cfg);

    let input = texts(&["a", "b"]);
    let result = proc.process(&input).await.unwrap();

    assert_eq!(result.vectors.len(), 2);
    assert_eq!(result.vectors[0], vector_for("a", 2.0));
    assert_eq!(result.vectors[1], vec![0.0; dim]);
    assert_eq!(result.substituted, 1);
}

#[tokio::test]
async fn rejection_fails_fast_without_zero_fill() {
    let primary = MockBackend::new(
        "primary",
        1.0,
        Script {
            reject_batches: true,
            ..Default::default()
        },
    );
    let secondary = MockBackend::new("secondary", 2.0, Script::default());
    let proc = processor(primary, secondary.clone(), test_config());

    let err = proc.process(&texts(&["a"])).await.unwrap_err();
    assert!(err.is_rejection());
    // The rejection never reached the secondary tier.
    assert_eq!(secondary.batch_calls(), 0);
}

#[tokio::test]
async fn cache_serves_second_call_entirely() {
    let primary = MockBackend::new("primary", 1.0, Script::default());
    let secondary = MockBackend::new("secondary", 2.0, Script::default());
    let cfg = EmbeddingConfig {
        cache_enabled: true,
        ..test_config()
    };
    let proc = processor(primary.clone(), secondary, cfg);

    let input = texts(&["a", "b", "c"]);
    let first = proc.process(&input).await.unwrap();
    let stats = first.cache_stats.unwrap();
    assert_eq!(stats.hits, 0);
    assert_eq!(stats.misses, 3);
    let calls_after_first = primary.batch_calls();

    let second = proc.process(&input).await.unwrap();
    let stats = second.cache_stats.unwrap();
    assert_eq!(stats.hits, 3);
    assert_eq!(stats.misses, 0);
    assert!((stats.hit_rate - 1.0).abs() < 1e-9);
    assert_eq!(primary.batch_calls(), calls_after_first);
    assert_eq!(first.vectors, second.vectors);
}

#[tokio::test]
async fn missing_cost_contributes_zero() {
    let primary = MockBackend::new(
        "primary",
        1.0,
        Script {
            usage: Some(UsageWire {
                total_tokens: 40,
                cost: None,
            }),
            ..Default::default()
        },
    );
    let secondary = MockBackend::new("secondary", 2.0, Script::default());
    let proc = processor(primary, secondary, test_config());

    let result = proc.process(&texts(&["a", "b"])).await.unwrap();
    assert_eq!(result.usage.total_tokens, 40);
    assert_eq!(result.usage.cost_usd, 0.0);
}

#[tokio::test]
async fn missing_usage_is_estimated() {
    // Script::default() attaches no usage at all.
    let primary = MockBackend::new("primary", 1.0, Script::default());
    let secondary = MockBackend::new("secondary", 2.0, Script::default());
    let proc = processor(primary, secondary, test_config());

    let result = proc.process(&texts(&["abcd", "efgh"])).await.unwrap();
    // ceil(4/4) per text with the heuristic estimator.
    assert_eq!(result.usage.total_tokens, 2);
    assert!(result.usage.cost_usd > 0.0);
}

#[tokio::test]
async fn empty_input_is_empty_output() {
    let primary = MockBackend::new("primary", 1.0, Script::default());
    let secondary = MockBackend::new("secondary", 2.0, Script::default());
    let proc = processor(primary.clone(), secondary, test_config());

    let result = proc.process(&[]).await.unwrap();
    assert!(result.vectors.is_empty());
    assert_eq!(result.usage.total_tokens, 0);
    assert_eq!(primary.batch_calls(), 0);
}

#[tokio::test]
async fn single_embed_falls_back() {
    let primary = MockBackend::new(
        "primary",
        1.0,
        Script {
            fail_singles: texts(&["q"]),
            ..Default::default()
        },
    );
    let secondary = MockBackend::new("secondary", 2.0, Script::default());
    let proc = processor(primary, secondary, test_config());

    let vector = proc.embed_single("q", None).await.unwrap();
    assert_eq!(vector, vector_for("q", 2.0));
}

#[tokio::test]
async fn single_embed_surfaces_exhaustion() {
    let primary = MockBackend::new(
        "primary",
        1.0,
        Script {
            fail_singles: texts(&["q"]),
            ..Default::default()
        },
    );
    let secondary = MockBackend::new(
        "secondary",
        2.0,
        Script {
            fail_singles: texts(&["q"]),
            ..Default::default()
        },
    );
    let proc = processor(primary, secondary, test_config());

    let err = proc.embed_single("q", None).await.unwrap_err();
    assert!(matches!(err, EmbeddingError::Upstream(_)));
    assert!(!err.is_rejection());
}
