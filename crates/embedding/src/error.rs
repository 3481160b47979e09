use aigate::fallback::FallbackError;
use thiserror::Error;

/// Errors surfaced by the batch processor.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("invalid embedding config: {0}")]
    InvalidConfig(String),
    /// Every fallback tier failed, or the request itself was rejected.
    #[error("{0}")]
    Upstream(#[from] FallbackError),
    /// Internal invariant breach: output count diverged from input count.
    /// Must never occur; misaligned data is never returned.
    #[error("positional integrity violated: expected {expected} vectors, produced {actual}")]
    PositionalIntegrity { expected: usize, actual: usize },
}

impl EmbeddingError {
    /// Whether the failure was caused by the request itself (fail-fast path)
    /// rather than upstream availability.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            EmbeddingError::Upstream(FallbackError::Rejected { .. })
        )
    }
}
