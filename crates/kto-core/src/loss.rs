//! The KTO alignment loss on chosen/rejected log-probability pairs.
//!
//! Based on "KTO: Model Alignment as Prospect Theoretic Optimization"
//! (Ethayarajh et al., arXiv:2402.01306). For a chosen example:
//!
//! ```text
//! loss = 1 - sigmoid(beta * (logratio - KL))
//! ```
//!
//! and for a rejected example:
//!
//! ```text
//! loss = 1 - sigmoid(beta * (KL - logratio))
//! ```
//!
//! where `logratio = policy_logp - ref_logp`. The KL baseline is fixed at
//! zero in this variant: no separate unpaired reference batch is modeled.
//! Rewards are `beta * logratio`, detached from the gradient graph; they are
//! diagnostics only.
//!
//! Losses are summed, never averaged. Normalization, if any, is the
//! caller's responsibility and is applied once over the whole batch, which
//! is what makes the result invariant to how the batch is chunked.

use burn::tensor::{activation, backend::Backend, Tensor};

/// Per-example losses and detached rewards for one side of the pairing.
/// Both tensors have the length of the input log-probability sequences.
type SideOutput<B> = (Tensor<B, 1>, Tensor<B, 1>);

/// Losses and rewards for chosen examples: `1 - sigmoid(beta * logratio)`.
pub fn chosen_losses<B: Backend>(
    policy_logps: Tensor<B, 1>,
    ref_logps: Tensor<B, 1>,
    beta: f64,
) -> SideOutput<B> {
    let logratios = policy_logps - ref_logps;
    let rewards = logratios.clone().detach().mul_scalar(beta);
    let losses = activation::sigmoid(logratios.mul_scalar(beta))
        .neg()
        .add_scalar(1.0);
    (losses, rewards)
}

/// Losses and rewards for rejected examples: `1 - sigmoid(-beta * logratio)`.
pub fn rejected_losses<B: Backend>(
    policy_logps: Tensor<B, 1>,
    ref_logps: Tensor<B, 1>,
    beta: f64,
) -> SideOutput<B> {
    let logratios = policy_logps - ref_logps;
    let rewards = logratios.clone().detach().mul_scalar(beta);
    let losses = activation::sigmoid(logratios.mul_scalar(-beta))
        .neg()
        .add_scalar(1.0);
    (losses, rewards)
}

/// Combined output of [`kto_alignment_loss`].
pub struct KtoChunkLoss<B: Backend> {
    /// Chosen losses followed by rejected losses, concatenated.
    pub losses: Tensor<B, 1>,
    /// `beta * chosen_logratio`, detached.
    pub chosen_rewards: Tensor<B, 1>,
    /// `beta * rejected_logratio`, detached.
    pub rejected_rewards: Tensor<B, 1>,
}

/// The full alignment loss for a slice containing at least one chosen and
/// one rejected example. The chosen and rejected sequences may differ in
/// length when a chunk boundary splits the two halves unevenly; callers with
/// a single-sided slice use [`chosen_losses`] / [`rejected_losses`] directly.
pub fn kto_alignment_loss<B: Backend>(
    policy_chosen_logps: Tensor<B, 1>,
    policy_rejected_logps: Tensor<B, 1>,
    ref_chosen_logps: Tensor<B, 1>,
    ref_rejected_logps: Tensor<B, 1>,
    beta: f64,
) -> KtoChunkLoss<B> {
    let (chosen, chosen_rewards) = chosen_losses(policy_chosen_logps, ref_chosen_logps, beta);
    let (rejected, rejected_rewards) =
        rejected_losses(policy_rejected_logps, ref_rejected_logps, beta);
    KtoChunkLoss {
        losses: Tensor::cat(vec![chosen, rejected], 0),
        chosen_rewards,
        rejected_rewards,
    }
}
