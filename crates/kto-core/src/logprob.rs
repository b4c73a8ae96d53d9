//! Per-example target log-probabilities for a batch slice.
//!
//! This is the projection half of the fused loss: project hidden states
//! through the vocabulary-sized linear layer, log-softmax over the vocab
//! dimension, gather the target token's log-probability, zero out ignored
//! positions, and sum over the sequence. The logits tensor only ever covers
//! the slice it is called with, which is what keeps peak activation memory
//! proportional to `chunk_size * vocab`.

use burn::tensor::{activation, backend::Backend, Int, Tensor};

/// Sum of target-token log-probabilities per example, `[n]`.
///
/// Positions whose target equals `ignore_index` contribute zero. Generic
/// over the backend: the policy path runs this on an autodiff backend, the
/// frozen reference path on the inner backend with no tracking.
pub fn chunk_log_probs<B: Backend>(
    hidden: Tensor<B, 3>,
    target: Tensor<B, 2, Int>,
    weight: Tensor<B, 2>,
    bias: Option<Tensor<B, 1>>,
    ignore_index: i64,
) -> Tensor<B, 1> {
    let [n, seq_len, hidden_dim] = hidden.shape().dims();

    let mut logits = hidden
        .reshape([n * seq_len, hidden_dim])
        .matmul(weight.transpose());
    if let Some(bias) = bias {
        logits = logits + bias.unsqueeze();
    }
    let log_probs = activation::log_softmax(logits, 1);

    // Ignored targets are out of vocab range; clamp them to index 0 for the
    // gather and mask the result to zero afterwards.
    let ignored = target.clone().equal_elem(ignore_index);
    let safe_target = target.mask_fill(ignored.clone(), 0);

    let gathered = log_probs
        .gather(1, safe_target.reshape([n * seq_len, 1]))
        .reshape([n, seq_len]);

    gathered.mask_fill(ignored, 0.0).sum_dim(1).reshape([n])
}

/// Number of non-ignored target positions per example, `[n]`.
///
/// Examples with zero valid positions are masked out of the loss entirely
/// (they carry no signal, and their log-probability sum is exactly zero).
pub fn valid_token_counts<B: Backend>(
    target: &Tensor<B, 2, Int>,
    ignore_index: i64,
) -> Tensor<B, 1> {
    let [n, _seq_len] = target.shape().dims();
    target
        .clone()
        .equal_elem(ignore_index)
        .bool_not()
        .float()
        .sum_dim(1)
        .reshape([n])
}

#[cfg(test)]
mod tests {
    use burn::tensor::{Tensor, TensorData};

    use super::*;
    use crate::CpuBackend;

    type B = CpuBackend;

    fn close(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-5, "{a} vs {b}");
    }

    /// One example, two positions, three-token vocab. With the weight rows
    /// chosen below the logits are one-hot, so the expected log-softmax
    /// values can be written out directly.
    #[test]
    fn hand_computed_log_probs() {
        let device = Default::default();
        let hidden = Tensor::<B, 3>::from_data(
            TensorData::new(vec![1.0f32, 0.0, 0.0, 1.0], [1usize, 2, 2]),
            &device,
        );
        let weight = Tensor::<B, 2>::from_data(
            TensorData::new(vec![1.0f32, 0.0, 0.0, 1.0, 0.0, 0.0], [3usize, 2]),
            &device,
        );
        let target =
            Tensor::<B, 2, Int>::from_data(TensorData::new(vec![0i64, 1], [1usize, 2]), &device);

        let logps = chunk_log_probs(hidden, target, weight, None, -100);
        let expected = 2.0 * (1.0 - (1f32.exp() + 2.0).ln());
        close(logps.into_scalar(), expected);
    }

    #[test]
    fn ignored_positions_contribute_zero() {
        let device = Default::default();
        let hidden = Tensor::<B, 3>::from_data(
            TensorData::new(vec![1.0f32, 0.0, 0.0, 1.0], [1usize, 2, 2]),
            &device,
        );
        let weight = Tensor::<B, 2>::from_data(
            TensorData::new(vec![1.0f32, 0.0, 0.0, 1.0, 0.0, 0.0], [3usize, 2]),
            &device,
        );
        let target =
            Tensor::<B, 2, Int>::from_data(TensorData::new(vec![0i64, -100], [1usize, 2]), &device);

        let logps = chunk_log_probs(hidden, target, weight, None, -100);
        let expected = 1.0 - (1f32.exp() + 2.0).ln();
        close(logps.into_scalar(), expected);
    }

    #[test]
    fn all_ignored_example_sums_to_zero() {
        let device = Default::default();
        let hidden = Tensor::<B, 3>::random(
            [1, 3, 4],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );
        let weight = Tensor::<B, 2>::random(
            [5, 4],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );
        let target = Tensor::<B, 2, Int>::from_data(
            TensorData::new(vec![-100i64, -100, -100], [1usize, 3]),
            &device,
        );

        let logps = chunk_log_probs(hidden, target, weight, None, -100);
        close(logps.into_scalar(), 0.0);
    }

    #[test]
    fn bias_shifts_logits() {
        let device = Default::default();
        let hidden = Tensor::<B, 3>::from_data(
            TensorData::new(vec![0.0f32, 0.0], [1usize, 1, 2]),
            &device,
        );
        let weight = Tensor::<B, 2>::zeros([2, 2], &device);
        let bias = Tensor::<B, 1>::from_data(TensorData::new(vec![1.0f32, 0.0], [2usize]), &device);
        let target =
            Tensor::<B, 2, Int>::from_data(TensorData::new(vec![0i64], [1usize, 1]), &device);

        let logps = chunk_log_probs(hidden, target, weight, Some(bias), -100);
        let expected = 1.0 - (1f32.exp() + 1.0).ln();
        close(logps.into_scalar(), expected);
    }

    #[test]
    fn counts_valid_tokens() {
        let device = Default::default();
        let target = Tensor::<B, 2, Int>::from_data(
            TensorData::new(vec![3i64, -100, 1, -100, -100, -100], [2usize, 3]),
            &device,
        );
        let counts = valid_token_counts(&target, -100);
        let values = counts.to_data().convert::<f32>().to_vec::<f32>().unwrap();
        assert_eq!(values, vec![2.0, 0.0]);
    }
}
