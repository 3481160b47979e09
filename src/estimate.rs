//! Token counting and cost estimation.
//!
//! Pure functions over text and counts. The estimator prefers an exact
//! tokenizer when one is configured and falls back to a deterministic
//! character heuristic, so counts are always available even without model
//! assets on disk.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tokenizers::Tokenizer;

/// Counts tokens, exactly when possible.
pub struct TokenEstimator {
    tokenizer: Option<Tokenizer>,
}

impl TokenEstimator {
    /// Estimator without a tokenizer; always uses the character heuristic.
    pub fn approximate() -> Self {
        Self { tokenizer: None }
    }

    /// Load a `tokenizer.json` for exact counts. A load failure degrades to
    /// the heuristic rather than failing startup.
    pub fn from_file(path: &Path) -> Self {
        match Tokenizer::from_file(path) {
            Ok(tokenizer) => Self {
                tokenizer: Some(tokenizer),
            },
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to load tokenizer, using character estimate"
                );
                Self { tokenizer: None }
            }
        }
    }

    /// Whether exact counting is available.
    pub fn is_exact(&self) -> bool {
        self.tokenizer.is_some()
    }

    /// Token count for `text`: exact when a tokenizer is loaded, otherwise
    /// `ceil(chars / 4)`.
    pub fn count(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        if let Some(tokenizer) = &self.tokenizer {
            if let Ok(encoding) = tokenizer.encode(text, false) {
                return encoding.get_ids().len();
            }
        }
        text.chars().count().div_ceil(4)
    }
}

/// Fixed pricing constants used by [`estimate_cost`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostRates {
    /// USD per one million tokens.
    pub usd_per_million_tokens: f64,
    /// Fixed USD → CNY conversion.
    pub usd_to_cny: f64,
}

impl Default for CostRates {
    fn default() -> Self {
        Self {
            usd_per_million_tokens: 0.02,
            usd_to_cny: 7.2,
        }
    }
}

/// Cost breakdown for a token count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub tokens: u64,
    pub cost_usd: f64,
    pub cost_cny: f64,
}

/// Cost of `tokens` at the given rates. Counts are unsigned, so there is no
/// failure mode.
pub fn estimate_cost(tokens: u64, rates: &CostRates) -> CostEstimate {
    let cost_usd = tokens as f64 / 1_000_000.0 * rates.usd_per_million_tokens;
    CostEstimate {
        tokens,
        cost_usd,
        cost_cny: cost_usd * rates.usd_to_cny,
    }
}
