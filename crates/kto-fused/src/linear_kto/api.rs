//! Public entry points for the fused linear + KTO loss.

use burn::tensor::{backend::AutodiffBackend, Tensor};

use kto_core::{KtoAuxOutputs, KtoInputs, KtoLossConfig, KtoResult};

use super::forward::fused_forward;
use super::types::{KtoForwardOutput, KtoGradients};

/// The fused loss as an explicit forward/backward pair.
///
/// `forward` returns a [`KtoForwardOutput`] whose context holds the
/// accumulated gradients; the caller decides when (and with what upstream
/// scale) to materialize them via [`super::KtoContext::backward`].
pub struct FusedLinearKtoFunction;

impl FusedLinearKtoFunction {
    pub fn forward<B: AutodiffBackend>(
        inputs: KtoInputs<B>,
        config: &KtoLossConfig,
    ) -> KtoResult<KtoForwardOutput<B>> {
        fused_forward(inputs, config)
    }
}

/// One-call functional form: forward plus backward with unit upstream
/// gradient, for callers that want the loss and its input gradients together.
pub fn fused_linear_kto<B: AutodiffBackend>(
    inputs: KtoInputs<B>,
    config: &KtoLossConfig,
) -> KtoResult<(Tensor<B, 1>, KtoAuxOutputs<B>, KtoGradients<B::InnerBackend>)> {
    let out = fused_forward(inputs, config)?;
    let grads = out.context.backward(1.0);
    Ok((out.loss, out.aux, grads))
}

/// Configured, reusable wrapper around the fused loss.
///
/// Validates its configuration once at construction so per-batch calls only
/// pay for shape checks.
#[derive(Debug, Clone)]
pub struct FusedLinearKtoLoss {
    config: KtoLossConfig,
}

impl FusedLinearKtoLoss {
    pub fn new(config: KtoLossConfig) -> KtoResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &KtoLossConfig {
        &self.config
    }

    pub fn forward<B: AutodiffBackend>(
        &self,
        inputs: KtoInputs<B>,
    ) -> KtoResult<KtoForwardOutput<B>> {
        fused_forward(inputs, &self.config)
    }
}
