//! Batched embedding with positional-integrity guarantees.
//!
//! The processor never returns misaligned data: output index `i` always
//! corresponds to input index `i`, whatever combination of bulk failures,
//! per-item failures, and cache hits produced it. Degradation order per
//! batch: primary bulk → secondary bulk → secondary per-item → zero vector.

use std::sync::Arc;

use aigate::estimate::{estimate_cost, TokenEstimator};
use aigate::fallback::{run_tiers, FallbackError, Strategy, Tier};

use crate::backend::{EmbeddingBackend, HttpEmbeddingBackend};
use crate::cache::EmbeddingCache;
use crate::config::EmbeddingConfig;
use crate::error::EmbeddingError;
use crate::types::{BatchResult, CacheStats, Usage};

pub struct BatchProcessor {
    primary: Arc<dyn EmbeddingBackend>,
    secondary: Arc<dyn EmbeddingBackend>,
    cache: Option<EmbeddingCache>,
    estimator: TokenEstimator,
    cfg: EmbeddingConfig,
}

impl BatchProcessor {
    pub fn new(
        primary: Arc<dyn EmbeddingBackend>,
        secondary: Arc<dyn EmbeddingBackend>,
        cache: Option<EmbeddingCache>,
        estimator: TokenEstimator,
        cfg: EmbeddingConfig,
    ) -> Self {
        Self {
            primary,
            secondary,
            cache,
            estimator,
            cfg,
        }
    }

    /// Wire up HTTP backends and the cache from configuration.
    pub fn from_config(cfg: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let connect_timeout = std::time::Duration::from_secs(cfg.connect_timeout_secs);
        let primary = Arc::new(HttpEmbeddingBackend::new(
            "primary",
            cfg.primary_url.clone(),
            cfg.primary_api_key.clone(),
            connect_timeout,
        )?);
        let secondary = Arc::new(HttpEmbeddingBackend::new(
            "secondary",
            cfg.secondary_url.clone(),
            cfg.secondary_api_key.clone(),
            connect_timeout,
        )?);
        let cache = cfg
            .cache_enabled
            .then(|| EmbeddingCache::new(cfg.cache_max_size, cfg.cache_ttl()));
        let estimator = match &cfg.tokenizer_path {
            Some(path) => TokenEstimator::from_file(path),
            None => TokenEstimator::approximate(),
        };
        Ok(Self::new(primary, secondary, cache, estimator, cfg.clone()))
    }

    pub fn config(&self) -> &EmbeddingConfig {
        &self.cfg
    }

    /// Embed `texts` with the configured default model.
    pub async fn process(&self, texts: &[String]) -> Result<BatchResult, EmbeddingError> {
        self.process_with_model(texts, None).await
    }

    /// Embed `texts`, batch by batch. Always returns one vector per input
    /// text, index-aligned.
    pub async fn process_with_model(
        &self,
        texts: &[String],
        model: Option<&str>,
    ) -> Result<BatchResult, EmbeddingError> {
        if texts.is_empty() {
            return Ok(BatchResult {
                vectors: Vec::new(),
                usage: Usage::default(),
                cache_stats: self.cache.as_ref().map(|_| CacheStats {
                    hits: 0,
                    misses: 0,
                    hit_rate: 0.0,
                }),
                substituted: 0,
            });
        }

        let model = model.unwrap_or(&self.cfg.model);
        let batch_size = self.cfg.batch_size.max(1);
        let total_batches = texts.len().div_ceil(batch_size);
        tracing::info!(
            texts = texts.len(),
            model,
            batch_size,
            total_batches,
            "starting batch embedding"
        );

        let mut slots: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        let mut usage = Usage::default();
        let mut hits = 0u64;
        let mut misses = 0u64;
        let mut substituted = 0usize;

        for (batch_idx, chunk_start) in (0..texts.len()).step_by(batch_size).enumerate() {
            let chunk_end = (chunk_start + batch_size).min(texts.len());

            // Serve cached positions first; only the remainder goes upstream.
            let mut uncached: Vec<String> = Vec::new();
            let mut uncached_at: Vec<usize> = Vec::new();
            for (offset, text) in texts[chunk_start..chunk_end].iter().enumerate() {
                if let Some(cache) = &self.cache {
                    if let Some(vector) = cache.get(model, text) {
                        slots[chunk_start + offset] = Some(vector);
                        hits += 1;
                        continue;
                    }
                }
                misses += 1;
                uncached.push(text.clone());
                uncached_at.push(chunk_start + offset);
            }

            if !uncached.is_empty() {
                self.embed_uncached(
                    model,
                    &uncached,
                    &uncached_at,
                    &mut slots,
                    &mut usage,
                    &mut substituted,
                    batch_idx,
                )
                .await?;
            }

            // Progress is observational; the hit rate never steers control flow.
            tracing::debug!(
                batch = batch_idx + 1,
                total = total_batches,
                hit_rate = hits as f64 / (hits + misses).max(1) as f64,
                "embedding batch complete"
            );

            if chunk_end < texts.len() && !self.cfg.inter_batch_delay().is_zero() {
                tokio::time::sleep(self.cfg.inter_batch_delay()).await;
            }
        }

        let mut vectors = Vec::with_capacity(texts.len());
        for slot in slots {
            match slot {
                Some(vector) => vectors.push(vector),
                None => {
                    return Err(EmbeddingError::PositionalIntegrity {
                        expected: texts.len(),
                        actual: vectors.len(),
                    })
                }
            }
        }
        if vectors.len() != texts.len() {
            return Err(EmbeddingError::PositionalIntegrity {
                expected: texts.len(),
                actual: vectors.len(),
            });
        }

        let cache_stats = self.cache.as_ref().map(|_| CacheStats {
            hits,
            misses,
            hit_rate: hits as f64 / texts.len() as f64,
        });

        tracing::info!(
            vectors = vectors.len(),
            total_tokens = usage.total_tokens,
            substituted,
            "batch embedding finished"
        );

        Ok(BatchResult {
            vectors,
            usage,
            cache_stats,
            substituted,
        })
    }

    /// Embed one text with tier fallback and the interactive timeout.
    pub async fn embed_single(
        &self,
        text: &str,
        model: Option<&str>,
    ) -> Result<Vec<f32>, EmbeddingError> {
        let model = model.unwrap_or(&self.cfg.model);
        if let Some(cache) = &self.cache {
            if let Some(vector) = cache.get(model, text) {
                return Ok(vector);
            }
        }

        let strategies = vec![
            Strategy::new(Tier::Primary, move || async move {
                self.primary.embed_single(model, text).await
            }),
            Strategy::new(Tier::Secondary, move || async move {
                self.secondary.embed_single(model, text).await
            }),
        ];
        let outcome = run_tiers(self.cfg.single_timeout(), strategies).await?;

        if let Some(cache) = &self.cache {
            cache.put(model, text, outcome.value.clone());
        }
        Ok(outcome.value)
    }

    #[allow(clippy::too_many_arguments)]
    async fn embed_uncached(
        &self,
        model: &str,
        uncached: &[String],
        uncached_at: &[usize],
        slots: &mut [Option<Vec<f32>>],
        usage: &mut Usage,
        substituted: &mut usize,
        batch_idx: usize,
    ) -> Result<(), EmbeddingError> {
        let strategies = vec![
            Strategy::new(Tier::Primary, move || async move {
                self.primary.embed_batch(model, uncached).await
            }),
            Strategy::new(Tier::Secondary, move || async move {
                self.secondary.embed_batch(model, uncached).await
            }),
        ];

        match run_tiers(self.cfg.bulk_timeout(), strategies).await {
            Ok(outcome) => {
                let batch = outcome.value;
                for ((vector, text), &index) in
                    batch.vectors.into_iter().zip(uncached).zip(uncached_at)
                {
                    if let Some(cache) = &self.cache {
                        cache.put(model, text, vector.clone());
                    }
                    slots[index] = Some(vector);
                }
                match batch.usage {
                    Some(wire) => {
                        usage.total_tokens += wire.total_tokens;
                        // Missing cost contributes zero rather than failing.
                        usage.cost_usd += wire.cost.unwrap_or(0.0);
                    }
                    None => self.accumulate_estimated(uncached.iter(), usage),
                }
                if let Some(stats) = batch.cache_stats {
                    tracing::debug!(
                        hits = stats.hits,
                        misses = stats.misses,
                        hit_rate = stats.hit_rate.unwrap_or(0.0),
                        "backend-side cache stats"
                    );
                }
                Ok(())
            }
            Err(err @ FallbackError::Rejected { .. }) => {
                // Client-caused: zero-filling would only mask a bad request.
                Err(err.into())
            }
            Err(FallbackError::Exhausted { summary, .. }) => {
                tracing::warn!(
                    batch = batch_idx + 1,
                    reason = %summary,
                    "bulk tiers exhausted, retrying items individually"
                );
                self.retry_items(model, uncached, uncached_at, slots, usage, substituted)
                    .await;
                Ok(())
            }
        }
    }

    /// Last resort for a failed batch: one secondary call per item, spaced
    /// out to stay under rate limits; positions that still fail get a zero
    /// vector so the alignment invariant holds.
    async fn retry_items(
        &self,
        model: &str,
        uncached: &[String],
        uncached_at: &[usize],
        slots: &mut [Option<Vec<f32>>],
        usage: &mut Usage,
        substituted: &mut usize,
    ) {
        for (item, (text, &index)) in uncached.iter().zip(uncached_at).enumerate() {
            let attempt = tokio::time::timeout(
                self.cfg.single_timeout(),
                self.secondary.embed_single(model, text),
            )
            .await;

            match attempt {
                Ok(Ok(vector)) => {
                    if let Some(cache) = &self.cache {
                        cache.put(model, text, vector.clone());
                    }
                    slots[index] = Some(vector);
                    self.accumulate_estimated(std::iter::once(text), usage);
                }
                Ok(Err(err)) => {
                    tracing::warn!(index, reason = %err.reason, "item retry failed, substituting zero vector");
                    slots[index] = Some(vec![0.0; self.cfg.embedding_dim]);
                    *substituted += 1;
                }
                Err(_) => {
                    tracing::warn!(index, "item retry timed out, substituting zero vector");
                    slots[index] = Some(vec![0.0; self.cfg.embedding_dim]);
                    *substituted += 1;
                }
            }

            let last = item + 1 == uncached.len();
            if !last && !self.cfg.inter_item_delay().is_zero() {
                tokio::time::sleep(self.cfg.inter_item_delay()).await;
            }
        }
    }

    fn accumulate_estimated<'t>(
        &self,
        texts: impl Iterator<Item = &'t String>,
        usage: &mut Usage,
    ) {
        let tokens: usize = texts.map(|t| self.estimator.count(t)).sum();
        let estimate = estimate_cost(tokens as u64, &self.cfg.rates);
        usage.total_tokens += estimate.tokens;
        usage.cost_usd += estimate.cost_usd;
    }
}
