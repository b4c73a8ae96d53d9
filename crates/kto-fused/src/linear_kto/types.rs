//! Output and gradient-context types for the fused path.

use burn::tensor::{backend::AutodiffBackend, backend::Backend, Tensor};

use kto_core::KtoAuxOutputs;

/// Everything the forward pass produces: the scalar loss, detached metrics
/// and the gradient context for a deferred backward.
///
/// The loss tensor carries no autodiff graph. The chunked computation already
/// ran reverse-mode per chunk, so backpropagation goes through
/// [`KtoContext::backward`] instead of the substrate's tape.
#[derive(Debug)]
pub struct KtoForwardOutput<B: AutodiffBackend> {
    /// Summed KTO loss over the batch, `[1]`, detached.
    pub loss: Tensor<B, 1>,
    /// Detached diagnostics (mean rewards and log-probabilities per side).
    pub aux: KtoAuxOutputs<B>,
    /// Accumulated gradients, pending the upstream scale.
    pub context: KtoContext<B>,
}

/// Gradient buffers accumulated across chunks during the forward pass.
///
/// Holds inner-backend tensors: these are results of per-chunk backward
/// passes, not graph nodes. [`KtoContext::backward`] scales them by the
/// upstream gradient of the scalar loss.
#[derive(Debug)]
pub struct KtoContext<B: AutodiffBackend> {
    pub(crate) grad_input: Tensor<B::InnerBackend, 3>,
    pub(crate) grad_weight: Tensor<B::InnerBackend, 2>,
    pub(crate) grad_bias: Option<Tensor<B::InnerBackend, 1>>,
}

/// Gradients with respect to every input of the fused loss.
///
/// Reference-model fields are always `None`: the reference is frozen and the
/// fused path never tracks it.
pub struct KtoGradients<B: Backend> {
    /// Gradient w.r.t. the hidden states, `[batch, seq_len, hidden]`.
    pub input: Tensor<B, 3>,
    /// Gradient w.r.t. the projection weight, `[vocab, hidden]`.
    pub weight: Tensor<B, 2>,
    /// Gradient w.r.t. the projection bias, `[vocab]`; `None` when no bias
    /// was supplied.
    pub bias: Option<Tensor<B, 1>>,
    /// Always `None`.
    pub ref_input: Option<Tensor<B, 3>>,
    /// Always `None`.
    pub ref_weight: Option<Tensor<B, 2>>,
    /// Always `None`.
    pub ref_bias: Option<Tensor<B, 1>>,
}
