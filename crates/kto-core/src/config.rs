//! Configuration for the chunked linear + KTO loss.

use serde::{Deserialize, Serialize};

use crate::error::{KtoError, KtoResult};

/// Sentinel target id marking positions excluded from the loss (padding).
pub const DEFAULT_IGNORE_INDEX: i64 = -100;

/// Configuration shared by the fused and unfused KTO loss paths.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KtoLossConfig {
    /// Target id excluded from log-probability sums and gradients.
    pub ignore_index: i64,

    /// Temperature controlling preference strength. Typical range 0.1 to
    /// 0.5.
    pub beta: f64,

    /// Whether reference-model log-probabilities are subtracted. When false
    /// the reference log-probabilities are taken as zero and no reference
    /// tensors are required.
    pub use_ref_model: bool,

    /// Number of batch examples processed per chunk. Peak activation memory
    /// scales with `chunk_size * vocab`, not `batch * vocab`. The last chunk
    /// may be smaller.
    pub chunk_size: usize,
}

impl Default for KtoLossConfig {
    fn default() -> Self {
        Self {
            ignore_index: DEFAULT_IGNORE_INDEX,
            beta: 0.1,
            use_ref_model: true,
            chunk_size: 1,
        }
    }
}

impl KtoLossConfig {
    /// Create a config with the given beta and defaults for everything else.
    #[must_use]
    pub fn new(beta: f64) -> Self {
        Self {
            beta,
            ..Default::default()
        }
    }

    /// Set the ignore sentinel.
    #[must_use]
    pub fn with_ignore_index(mut self, ignore_index: i64) -> Self {
        self.ignore_index = ignore_index;
        self
    }

    /// Set the chunk size.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Disable the reference model (reference log-probabilities become zero).
    #[must_use]
    pub fn without_ref_model(mut self) -> Self {
        self.use_ref_model = false;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> KtoResult<()> {
        if self.beta <= 0.0 {
            return Err(KtoError::Config(format!(
                "beta must be positive, got {}",
                self.beta
            )));
        }
        if self.chunk_size == 0 {
            return Err(KtoError::Config("chunk_size must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn default_config() {
        let config = KtoLossConfig::default();
        assert_eq!(config.ignore_index, -100);
        assert!((config.beta - 0.1).abs() < f64::EPSILON);
        assert!(config.use_ref_model);
        assert_eq!(config.chunk_size, 1);
        assert!(config.validate().is_ok());
    }

    #[test_case(0.0; "zero")]
    #[test_case(-0.1; "negative")]
    fn rejects_non_positive_beta(beta: f64) {
        assert!(KtoLossConfig::new(beta).validate().is_err());
    }

    #[test]
    fn rejects_zero_chunk_size() {
        let config = KtoLossConfig::default().with_chunk_size(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn builders() {
        let config = KtoLossConfig::new(0.2)
            .with_ignore_index(42)
            .with_chunk_size(8)
            .without_ref_model();
        assert!((config.beta - 0.2).abs() < f64::EPSILON);
        assert_eq!(config.ignore_index, 42);
        assert_eq!(config.chunk_size, 8);
        assert!(!config.use_ref_model);
    }

    #[test]
    fn serde_round_trip() {
        let config = KtoLossConfig::new(0.2).with_chunk_size(4);
        let json = serde_json::to_string(&config).unwrap();
        let back: KtoLossConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn serde_fills_missing_fields_with_defaults() {
        let back: KtoLossConfig = serde_json::from_str("{\"beta\":0.3}").unwrap();
        assert!((back.beta - 0.3).abs() < f64::EPSILON);
        assert_eq!(back.ignore_index, -100);
        assert_eq!(back.chunk_size, 1);
    }
}
