//! Unfused reference implementation of the linear + KTO loss.
//!
//! Computes the identical mathematics to the fused path with no chunking:
//! the full `batch * seq_len * vocab` logits tensor is materialized in one
//! shot and gradients flow through the substrate's ordinary reverse-mode
//! pass. This is the correctness oracle for the fused path, not a production
//! path; it accepts the same input contract so tests can substitute one for
//! the other.

use burn::tensor::{backend::Backend, Tensor};
use tracing::debug;

use crate::{
    config::KtoLossConfig,
    error::{KtoError, KtoResult},
    inputs::KtoInputs,
    logprob::{chunk_log_probs, valid_token_counts},
    loss::kto_alignment_loss,
    metrics::{AuxAccumulator, KtoAuxOutputs},
};

/// Full-batch KTO loss and auxiliary metrics.
///
/// Gradient tracking is whatever the caller set up on the input tensors;
/// reference log-probabilities are detached unconditionally, so reference
/// parameters never receive a gradient even when the caller marked them
/// `require_grad`.
pub fn unfused_linear_kto<B: Backend>(
    inputs: &KtoInputs<B>,
    config: &KtoLossConfig,
) -> KtoResult<(Tensor<B, 1>, KtoAuxOutputs<B>)> {
    let dims = inputs.validate(config)?;
    debug!(?dims, "unfused kto forward");
    let half = dims.half();
    let device = inputs.input.device();

    let policy_logps = chunk_log_probs(
        inputs.input.clone(),
        inputs.target.clone(),
        inputs.weight.clone(),
        inputs.bias.clone(),
        config.ignore_index,
    );

    let ref_logps = if config.use_ref_model {
        let (Some(ref_input), Some(ref_weight)) = (&inputs.ref_input, &inputs.ref_weight) else {
            return Err(KtoError::Config(
                "use_ref_model is set but reference tensors are missing".into(),
            ));
        };
        chunk_log_probs(
            ref_input.clone(),
            inputs.target.clone(),
            ref_weight.clone(),
            inputs.ref_bias.clone(),
            config.ignore_index,
        )
        .detach()
    } else {
        Tensor::zeros([dims.batch], &device)
    };

    // Examples whose targets are entirely ignored contribute zero loss and
    // zero gradient.
    let example_mask = valid_token_counts(&inputs.target, config.ignore_index)
        .greater_elem(0.0)
        .float();

    let policy_chosen = policy_logps.clone().slice([0..half]);
    let policy_rejected = policy_logps.slice([half..dims.batch]);
    let ref_chosen = ref_logps.clone().slice([0..half]);
    let ref_rejected = ref_logps.slice([half..dims.batch]);

    let out = kto_alignment_loss(
        policy_chosen.clone(),
        policy_rejected.clone(),
        ref_chosen,
        ref_rejected,
        config.beta,
    );
    let loss = (out.losses * example_mask).sum();

    let mut acc = AuxAccumulator::new(&device);
    acc.record_chosen(out.chosen_rewards, policy_chosen.detach());
    acc.record_rejected(out.rejected_rewards, policy_rejected.detach());

    Ok((loss, acc.finish()))
}
