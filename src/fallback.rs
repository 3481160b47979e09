//! Tiered fallback orchestration.
//!
//! A request is described as an ordered list of named strategies. Each tier
//! gets exactly one attempt, bounded by an operation-specific timeout; on a
//! degradable failure the next tier runs with the identical input. Retrying
//! within a tier is deliberately not done here — callers that want
//! finer-grained recovery (per-item retries, say) own that loop themselves.

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use thiserror::Error;

/// Which tier an attempt ran against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Primary,
    Secondary,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Primary => f.write_str("primary"),
            Tier::Secondary => f.write_str("secondary"),
        }
    }
}

/// Observability record for a single tier attempt. Never affects control flow.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub tier: Tier,
    pub latency: Duration,
    pub succeeded: bool,
    pub reason: Option<String>,
}

/// Uniform failure result returned by a strategy.
///
/// `degradable` marks failures worth degrading over (timeouts, server errors,
/// rate limiting). A client-caused failure is not: re-sending a bad request
/// to another tier cannot succeed, so the orchestrator fails fast instead.
#[derive(Debug, Clone)]
pub struct TierError {
    pub reason: String,
    pub degradable: bool,
}

impl TierError {
    /// A transient failure; the next tier should be tried.
    pub fn transient(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            degradable: true,
        }
    }

    /// A client-caused failure; no tier can recover it.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            degradable: false,
        }
    }
}

/// Whether an HTTP status code represents a degradable upstream failure.
///
/// Server errors, rate limiting, and request timeouts are worth degrading
/// over; every other client error means the request itself is at fault.
pub fn degradable_status(status: u16) -> bool {
    status >= 500 || status == 429 || status == 408
}

/// A named tier paired with the operation to run for it.
pub struct Strategy<'a, T> {
    pub tier: Tier,
    run: Box<dyn FnOnce() -> BoxFuture<'a, Result<T, TierError>> + Send + 'a>,
}

impl<'a, T> Strategy<'a, T> {
    pub fn new<F, Fut>(tier: Tier, operation: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = Result<T, TierError>> + Send + 'a,
    {
        Self {
            tier,
            run: Box::new(move || Box::pin(operation())),
        }
    }
}

/// Result of a successful orchestration.
#[derive(Debug)]
pub struct FallbackOutcome<T> {
    pub value: T,
    /// The tier that produced `value`.
    pub winner: Tier,
    /// One record per attempted tier, in evaluation order.
    pub attempts: Vec<AttemptRecord>,
}

#[derive(Debug, Error)]
pub enum FallbackError {
    /// A tier reported a non-degradable failure; later tiers were not tried.
    #[error("request rejected by {tier} tier: {reason}")]
    Rejected { tier: Tier, reason: String },
    /// Every tier failed.
    #[error("all tiers failed: {summary}")]
    Exhausted {
        summary: String,
        attempts: Vec<AttemptRecord>,
    },
}

/// Evaluate `strategies` in order, returning the first success.
///
/// Each attempt is bounded by `op_timeout`. A degradable failure emits one
/// degradation signal (a `warn` naming the failure reason and the tier being
/// degraded to) and moves on; a non-degradable failure returns immediately.
pub async fn run_tiers<T>(
    op_timeout: Duration,
    strategies: Vec<Strategy<'_, T>>,
) -> Result<FallbackOutcome<T>, FallbackError> {
    let tiers: Vec<Tier> = strategies.iter().map(|s| s.tier).collect();
    let mut attempts = Vec::with_capacity(strategies.len());
    let mut reasons = Vec::new();

    for (i, strategy) in strategies.into_iter().enumerate() {
        let tier = strategy.tier;
        let start = Instant::now();

        let failure = match tokio::time::timeout(op_timeout, (strategy.run)()).await {
            Ok(Ok(value)) => {
                attempts.push(AttemptRecord {
                    tier,
                    latency: start.elapsed(),
                    succeeded: true,
                    reason: None,
                });
                return Ok(FallbackOutcome {
                    value,
                    winner: tier,
                    attempts,
                });
            }
            Ok(Err(err)) => err,
            Err(_) => TierError::transient(format!(
                "timed out after {}ms",
                op_timeout.as_millis()
            )),
        };

        attempts.push(AttemptRecord {
            tier,
            latency: start.elapsed(),
            succeeded: false,
            reason: Some(failure.reason.clone()),
        });

        if !failure.degradable {
            return Err(FallbackError::Rejected {
                tier,
                reason: failure.reason,
            });
        }

        if let Some(next) = tiers.get(i + 1) {
            tracing::warn!(
                from = %tier,
                to = %next,
                reason = %failure.reason,
                "tier failed, degrading to fallback tier"
            );
        }
        reasons.push(format!("{tier}: {}", failure.reason));
    }

    Err(FallbackError::Exhausted {
        summary: reasons.join("; "),
        attempts,
    })
}
