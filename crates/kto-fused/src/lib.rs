#![warn(clippy::pedantic)]
#![allow(
    clippy::too_many_arguments,
    clippy::similar_names,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::doc_markdown,
    clippy::module_name_repetitions,
    clippy::too_many_lines,
    //
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_possible_wrap,
)]

//! KTO Fused
//!
//! Chunked fused linear + KTO loss. Instead of materializing the full
//! `batch * seq_len * vocab` logits tensor, the batch is processed in
//! consecutive chunks: each chunk runs its own projection, log-softmax and
//! loss, its gradients are accumulated, and the chunk's activations are
//! dropped before the next one starts. Peak activation memory is bounded by
//! `chunk_size * seq_len * vocab` regardless of batch size, and the result
//! is numerically equivalent to the full-batch computation because the loss
//! is a sum over examples.
//!
//! Entry points:
//! - `FusedLinearKtoFunction::forward` - loss, metrics and a gradient
//!   context for a deferred backward
//! - `fused_linear_kto` - functional forward + backward in one call
//! - `FusedLinearKtoLoss` - configured, reusable wrapper

pub mod linear_kto;

pub use linear_kto::{
    fused_linear_kto, FusedLinearKtoFunction, FusedLinearKtoLoss, KtoContext, KtoForwardOutput,
    KtoGradients,
};
