//! Error types for KTO loss computation.
//!
//! All failures are fatal to the call: shape and configuration problems are
//! detected before any chunk computation starts, and there is nothing to
//! retry. Non-finite values are deliberately not checked here; they propagate
//! to the caller.

/// Error type for KTO loss operations.
#[derive(Debug, thiserror::Error)]
pub enum KtoError {
    /// A tensor dimension does not match what the other inputs imply.
    #[error("shape mismatch for {what}: expected {expected:?}, got {found:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: Vec<usize>,
        found: Vec<usize>,
    },
    /// KTO pairs chosen and rejected examples positionally, so the batch
    /// size must be even.
    #[error("batch size must be even for chosen/rejected pairing, got {batch}")]
    OddBatch { batch: usize },
    /// An empty batch has no chosen/rejected split.
    #[error("batch must not be empty")]
    EmptyBatch,
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for KTO loss operations.
pub type KtoResult<T> = std::result::Result<T, KtoError>;
