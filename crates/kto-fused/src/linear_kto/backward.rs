//! Deferred backward: replay the accumulated buffers under an upstream scale.

use burn::tensor::backend::AutodiffBackend;

use super::types::{KtoContext, KtoGradients};

impl<B: AutodiffBackend> KtoContext<B> {
    /// Gradients of every input, scaled by `grad_output`, the upstream
    /// gradient of the scalar loss.
    ///
    /// The heavy reverse-mode work already happened chunk by chunk during the
    /// forward pass; this only scales the buffers, so calling it repeatedly
    /// with different scales is cheap.
    #[must_use]
    pub fn backward(&self, grad_output: f32) -> KtoGradients<B::InnerBackend> {
        KtoGradients {
            input: self.grad_input.clone().mul_scalar(grad_output),
            weight: self.grad_weight.clone().mul_scalar(grad_output),
            bias: self
                .grad_bias
                .clone()
                .map(|g| g.mul_scalar(grad_output)),
            ref_input: None,
            ref_weight: None,
            ref_bias: None,
        }
    }
}
