//! AI gateway core
//!
//! The building blocks shared by the relay and embedding crates: tiered
//! fallback orchestration and token/cost estimation.
//!
//! The fallback orchestrator is the load-bearing piece. Instead of nesting
//! try/catch-style branches, a request is an ordered list of named
//! strategies — primary first, then whatever should absorb its failures —
//! each returning a uniform success/failure result. One attempt per tier,
//! bounded by an operation-specific timeout. Whether a failure is worth
//! degrading over is decided by the strategy itself: a timeout or a 503 is,
//! a 400 is not.
//!
//! ```no_run
//! use std::time::Duration;
//! use aigate::fallback::{run_tiers, Strategy, Tier, TierError};
//!
//! # async fn example() {
//! let outcome = run_tiers(
//!     Duration::from_secs(30),
//!     vec![
//!         Strategy::new(Tier::Primary, || async { Err::<u32, _>(TierError::transient("HTTP 503")) }),
//!         Strategy::new(Tier::Secondary, || async { Ok(42) }),
//!     ],
//! )
//! .await
//! .unwrap();
//! assert_eq!(outcome.value, 42);
//! # }
//! ```
//!
//! Estimation is deliberately boring: exact token counts when a
//! `tokenizer.json` is around, `ceil(chars/4)` when it isn't, and fixed
//! per-million pricing on top.

pub mod estimate;
pub mod fallback;

pub use crate::estimate::{estimate_cost, CostEstimate, CostRates, TokenEstimator};
pub use crate::fallback::{
    degradable_status, run_tiers, AttemptRecord, FallbackError, FallbackOutcome, Strategy, Tier,
    TierError,
};
