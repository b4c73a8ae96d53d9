//! Chunked forward pass with immediate per-chunk differentiation.

use burn::tensor::{backend::AutodiffBackend, Int, Tensor};
use tracing::{debug, trace};

use kto_core::{
    chosen_losses, chunk_log_probs, rejected_losses, valid_token_counts, AuxAccumulator,
    KtoAuxOutputs, KtoInputs, KtoLossConfig, KtoResult,
};

use super::types::{KtoContext, KtoForwardOutput};

/// Run the fused linear + KTO loss over the batch in chunks of
/// `config.chunk_size` examples.
///
/// Each chunk is lifted into a fresh autodiff graph, differentiated on the
/// spot, and folded into running gradient buffers; no activation outlives its
/// chunk. The reference projection runs untracked on the inner backend, so
/// reference tensors never join a graph at all. The returned loss is the sum
/// over examples, which makes it independent of the chunk size; examples
/// whose targets are entirely ignored are masked out of both the loss and
/// the gradients.
pub fn fused_forward<B: AutodiffBackend>(
    inputs: KtoInputs<B>,
    config: &KtoLossConfig,
) -> KtoResult<KtoForwardOutput<B>> {
    let dims = inputs.validate(config)?;
    debug!(?dims, chunk_size = config.chunk_size, "fused kto forward");
    let half = dims.half();
    let inner = inputs.inner();
    let device = inner.input.device();

    let mut grad_input = inner.input.zeros_like();
    let mut grad_weight = inner.weight.zeros_like();
    let mut grad_bias = inner.bias.as_ref().map(Tensor::zeros_like);
    let mut loss_sum = Tensor::<B::InnerBackend, 1>::zeros([1], &device);
    let mut acc = AuxAccumulator::<B::InnerBackend>::new(&device);

    let mut start = 0;
    while start < dims.batch {
        let end = (start + config.chunk_size).min(dims.batch);
        let len = end - start;
        let chunk = inner.slice_batch(start..end);
        trace!(start, end, "kto chunk");

        // Frozen reference log-probabilities, computed untracked.
        let ref_logps_inner = match (&chunk.ref_input, &chunk.ref_weight) {
            (Some(ref_input), Some(ref_weight)) if config.use_ref_model => chunk_log_probs(
                ref_input.clone(),
                chunk.target.clone(),
                ref_weight.clone(),
                chunk.ref_bias.clone(),
                config.ignore_index,
            ),
            _ => Tensor::zeros([len], &device),
        };

        // Lift the policy side of the chunk into a fresh graph.
        let hidden = Tensor::<B, 3>::from_inner(chunk.input).require_grad();
        let weight = Tensor::<B, 2>::from_inner(chunk.weight).require_grad();
        let bias = chunk
            .bias
            .map(|b| Tensor::<B, 1>::from_inner(b).require_grad());
        let target = Tensor::<B, 2, Int>::from_inner(chunk.target);
        let ref_logps = Tensor::<B, 1>::from_inner(ref_logps_inner);

        let policy_logps = chunk_log_probs(
            hidden.clone(),
            target.clone(),
            weight.clone(),
            bias.clone(),
            config.ignore_index,
        );
        let example_mask = valid_token_counts(&target, config.ignore_index)
            .greater_elem(0.0)
            .float();

        // Examples below `half` (globally) are chosen; a chunk straddling the
        // boundary contributes to both sides.
        let chosen_len = half.saturating_sub(start).min(len);

        let mut sides = Vec::with_capacity(2);
        if chosen_len > 0 {
            let policy = policy_logps.clone().slice([0..chosen_len]);
            let (losses, rewards) = chosen_losses(
                policy.clone(),
                ref_logps.clone().slice([0..chosen_len]),
                config.beta,
            );
            acc.record_chosen(rewards.inner(), policy.inner());
            sides.push(losses);
        }
        if chosen_len < len {
            let policy = policy_logps.slice([chosen_len..len]);
            let (losses, rewards) = rejected_losses(
                policy.clone(),
                ref_logps.slice([chosen_len..len]),
                config.beta,
            );
            acc.record_rejected(rewards.inner(), policy.inner());
            sides.push(losses);
        }

        let chunk_loss = (Tensor::cat(sides, 0) * example_mask).sum();
        let grads = chunk_loss.backward();

        if let Some(g) = hidden.grad(&grads) {
            grad_input = grad_input.slice_assign([start..end], g);
        }
        if let Some(g) = weight.grad(&grads) {
            grad_weight = grad_weight + g;
        }
        if let (Some(buf), Some(bias)) = (grad_bias.take(), &bias) {
            grad_bias = Some(match bias.grad(&grads) {
                Some(g) => buf + g,
                None => buf,
            });
        }

        loss_sum = loss_sum + chunk_loss.inner();
        start = end;
    }

    Ok(KtoForwardOutput {
        loss: Tensor::from_inner(loss_sum),
        aux: lift_aux::<B>(acc.finish()),
        context: KtoContext {
            grad_input,
            grad_weight,
            grad_bias,
        },
    })
}

/// Move the accumulated metrics onto the autodiff backend, untracked.
fn lift_aux<B: AutodiffBackend>(aux: KtoAuxOutputs<B::InnerBackend>) -> KtoAuxOutputs<B> {
    KtoAuxOutputs {
        chosen_rewards_mean: Tensor::from_inner(aux.chosen_rewards_mean),
        rejected_rewards_mean: Tensor::from_inner(aux.rejected_rewards_mean),
        policy_chosen_logps_mean: Tensor::from_inner(aux.policy_chosen_logps_mean),
        policy_rejected_logps_mean: Tensor::from_inner(aux.policy_rejected_logps_mean),
        num_chosen: aux.num_chosen,
        num_rejected: aux.num_rejected,
    }
}
