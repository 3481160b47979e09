use aigate::fallback::FallbackError;
use thiserror::Error;

/// Errors surfaced when opening an upstream stream.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The upstream rejected the request itself; no tier can recover it.
    #[error("upstream rejected request: {0}")]
    Rejected(String),
    /// Every upstream tier failed.
    #[error("all upstream tiers failed: {0}")]
    Exhausted(String),
    #[error("invalid relay config: {0}")]
    InvalidConfig(String),
}

impl From<FallbackError> for RelayError {
    fn from(err: FallbackError) -> Self {
        match err {
            FallbackError::Rejected { tier, reason } => {
                RelayError::Rejected(format!("{tier}: {reason}"))
            }
            FallbackError::Exhausted { summary, .. } => RelayError::Exhausted(summary),
        }
    }
}
