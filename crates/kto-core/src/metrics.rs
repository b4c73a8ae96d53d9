//! Aggregated auxiliary outputs of the KTO loss.
//!
//! Rewards and log-probability diagnostics are accumulated as sums across
//! chunks and only turned into means once the whole batch has been seen, so
//! the reported values do not depend on the chunking.

use burn::tensor::{backend::Backend, Tensor};

/// Auxiliary metrics reported alongside the loss. All tensor fields are
/// single-element and detached; no gradient ever flows through them.
#[derive(Debug, Clone)]
pub struct KtoAuxOutputs<B: Backend> {
    /// Mean of `beta * chosen_logratio` over chosen examples.
    pub chosen_rewards_mean: Tensor<B, 1>,
    /// Mean of `beta * rejected_logratio` over rejected examples.
    pub rejected_rewards_mean: Tensor<B, 1>,
    /// Mean policy log-probability over chosen examples.
    pub policy_chosen_logps_mean: Tensor<B, 1>,
    /// Mean policy log-probability over rejected examples.
    pub policy_rejected_logps_mean: Tensor<B, 1>,
    /// Number of chosen examples in the batch.
    pub num_chosen: usize,
    /// Number of rejected examples in the batch.
    pub num_rejected: usize,
}

/// Accumulates auxiliary sums chunk by chunk.
pub struct AuxAccumulator<B: Backend> {
    chosen_reward_sum: Tensor<B, 1>,
    rejected_reward_sum: Tensor<B, 1>,
    chosen_logp_sum: Tensor<B, 1>,
    rejected_logp_sum: Tensor<B, 1>,
    num_chosen: usize,
    num_rejected: usize,
}

impl<B: Backend> AuxAccumulator<B> {
    #[must_use]
    pub fn new(device: &B::Device) -> Self {
        Self {
            chosen_reward_sum: Tensor::zeros([1], device),
            rejected_reward_sum: Tensor::zeros([1], device),
            chosen_logp_sum: Tensor::zeros([1], device),
            rejected_logp_sum: Tensor::zeros([1], device),
            num_chosen: 0,
            num_rejected: 0,
        }
    }

    /// Record the chosen-side rewards and policy log-probabilities of one
    /// chunk. Both tensors must be detached by the caller.
    pub fn record_chosen(&mut self, rewards: Tensor<B, 1>, policy_logps: Tensor<B, 1>) {
        let [n] = rewards.shape().dims();
        self.num_chosen += n;
        self.chosen_reward_sum = self.chosen_reward_sum.clone() + rewards.sum();
        self.chosen_logp_sum = self.chosen_logp_sum.clone() + policy_logps.sum();
    }

    /// Record the rejected-side rewards and policy log-probabilities of one
    /// chunk.
    pub fn record_rejected(&mut self, rewards: Tensor<B, 1>, policy_logps: Tensor<B, 1>) {
        let [n] = rewards.shape().dims();
        self.num_rejected += n;
        self.rejected_reward_sum = self.rejected_reward_sum.clone() + rewards.sum();
        self.rejected_logp_sum = self.rejected_logp_sum.clone() + policy_logps.sum();
    }

    /// Finalize sums into means. Zero counts yield zero means.
    #[must_use]
    pub fn finish(self) -> KtoAuxOutputs<B> {
        let mean = |sum: Tensor<B, 1>, count: usize| {
            if count == 0 {
                sum.zeros_like()
            } else {
                sum.div_scalar(count as f32)
            }
        };
        KtoAuxOutputs {
            chosen_rewards_mean: mean(self.chosen_reward_sum, self.num_chosen),
            rejected_rewards_mean: mean(self.rejected_reward_sum, self.num_rejected),
            policy_chosen_logps_mean: mean(self.chosen_logp_sum, self.num_chosen),
            policy_rejected_logps_mean: mean(self.rejected_logp_sum, self.num_rejected),
            num_chosen: self.num_chosen,
            num_rejected: self.num_rejected,
        }
    }
}
