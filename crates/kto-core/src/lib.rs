#![warn(clippy::pedantic)]
#![allow(
    clippy::too_many_arguments,
    clippy::similar_names,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::doc_markdown,
    clippy::module_name_repetitions,
    //
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_possible_wrap,
)]

//! KTO Core
//!
//! This crate provides the math shared by the fused and unfused KTO
//! (Kahneman-Tversky Optimization) loss paths:
//! - `KtoLossConfig` - loss configuration
//! - `KtoInputs` - input bundle with shape validation and batch slicing
//! - `chunk_log_probs` - per-example target log-probabilities for a batch slice
//! - `kto_alignment_loss` / `chosen_losses` / `rejected_losses` - the
//!   sigmoid preference loss on chosen/rejected log-probability pairs
//! - `unfused_linear_kto` - the straightforward full-batch oracle the fused
//!   path is validated against

pub mod config;
pub mod error;
pub mod inputs;
pub mod logprob;
pub mod loss;
pub mod metrics;
pub mod reference;
pub mod test_utils;

pub use config::{DEFAULT_IGNORE_INDEX, KtoLossConfig};
pub use error::{KtoError, KtoResult};
pub use inputs::{KtoDims, KtoInputs};
pub use logprob::{chunk_log_probs, valid_token_counts};
pub use loss::{chosen_losses, kto_alignment_loss, rejected_losses, KtoChunkLoss};
pub use metrics::{AuxAccumulator, KtoAuxOutputs};
pub use reference::unfused_linear_kto;

/// CPU backend used by the test suites and as the default substrate.
pub type CpuBackend = burn::backend::NdArray<f32>;
/// Autodiff-wrapped CPU backend.
pub type CpuAutodiffBackend = burn::backend::Autodiff<CpuBackend>;
