//! Shared test utilities for the KTO loss crates.

use burn::tensor::{backend::Backend, Distribution, Int, Tensor, TensorData};

use crate::inputs::KtoInputs;

/// Dimensions for KTO loss tests.
#[derive(Debug, Clone, Copy)]
pub struct TestDims {
    pub batch: usize,
    pub seq_len: usize,
    pub hidden: usize,
    pub vocab: usize,
}

impl TestDims {
    #[must_use]
    pub fn new(batch: usize, seq_len: usize, hidden: usize, vocab: usize) -> Self {
        Self {
            batch,
            seq_len,
            hidden,
            vocab,
        }
    }
}

/// Deterministic target ids for the given dimensions. Spread across the
/// vocab without any randomness so that tests are reproducible byte for
/// byte.
#[must_use]
pub fn deterministic_targets(dims: TestDims) -> Vec<i64> {
    (0..dims.batch * dims.seq_len)
        .map(|i| ((i * 31 + 17) % dims.vocab) as i64)
        .collect()
}

/// Every third (batch, position) pair, used to sprinkle ignore sentinels
/// over roughly a third of the targets.
#[must_use]
pub fn scattered_ignore_positions(dims: TestDims) -> Vec<(usize, usize)> {
    (0..dims.batch)
        .flat_map(|b| (0..dims.seq_len).map(move |t| (b, t)))
        .filter(|(b, t)| (b * dims.seq_len + t) % 3 == 0)
        .collect()
}

/// Generate a full input bundle with random hidden states/weights and
/// deterministic targets. `ignored` lists (batch, position) pairs to set to
/// the ignore sentinel.
pub fn generate_inputs<B: Backend>(
    dims: TestDims,
    bias: bool,
    ref_bias: bool,
    ignore_index: i64,
    ignored: &[(usize, usize)],
    device: &B::Device,
) -> KtoInputs<B> {
    let normal = Distribution::Normal(0.0, 1.0);

    let mut targets = deterministic_targets(dims);
    for &(b, t) in ignored {
        targets[b * dims.seq_len + t] = ignore_index;
    }

    KtoInputs {
        weight: Tensor::random([dims.vocab, dims.hidden], normal, device),
        input: Tensor::random([dims.batch, dims.seq_len, dims.hidden], normal, device),
        target: Tensor::<B, 2, Int>::from_data(
            TensorData::new(targets, [dims.batch, dims.seq_len]),
            device,
        ),
        bias: bias.then(|| Tensor::random([dims.vocab], normal, device)),
        ref_input: Some(Tensor::random(
            [dims.batch, dims.seq_len, dims.hidden],
            normal,
            device,
        )),
        ref_weight: Some(Tensor::random([dims.vocab, dims.hidden], normal, device)),
        ref_bias: ref_bias.then(|| Tensor::random([dims.vocab], normal, device)),
    }
}

/// Extract a tensor's values as f32 regardless of backend element type.
#[must_use]
pub fn to_vec_f32<B: Backend, const D: usize>(tensor: &Tensor<B, D>) -> Vec<f32> {
    tensor
        .to_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .unwrap()
}

/// Assert two f32 slices are close within `atol + rtol * |expected|`,
/// reporting the worst-offending index on failure.
pub fn assert_data_close(actual: &[f32], expected: &[f32], rtol: f32, atol: f32, name: &str) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "{name}: lengths differ: {} vs {}",
        actual.len(),
        expected.len()
    );

    let mut worst_excess = f32::MIN;
    let mut worst = None;
    for (i, (&a, &e)) in actual.iter().zip(expected.iter()).enumerate() {
        let tolerance = atol + rtol * e.abs();
        let excess = (a - e).abs() - tolerance;
        if excess > worst_excess {
            worst_excess = excess;
            worst = Some((i, a, e, tolerance));
        }
    }

    if let Some((i, a, e, tolerance)) = worst {
        eprintln!(
            "{name}: worst diff {:.6e} (tol {tolerance:.6e}) at idx {i}: actual={a:.6} expected={e:.6}",
            (a - e).abs()
        );
        assert!(
            worst_excess <= 0.0,
            "{name}: |{a} - {e}| = {:.6e} exceeds tolerance {tolerance:.6e} at index {i}",
            (a - e).abs()
        );
    }
}

/// Assert two single-element tensors are close.
pub fn assert_scalar_close<B: Backend>(
    actual: &Tensor<B, 1>,
    expected: &Tensor<B, 1>,
    rtol: f32,
    atol: f32,
    name: &str,
) {
    assert_data_close(&to_vec_f32(actual), &to_vec_f32(expected), rtol, atol, name);
}

/// Assert two tensors are elementwise close.
pub fn assert_tensors_close<B: Backend, const D: usize>(
    actual: &Tensor<B, D>,
    expected: &Tensor<B, D>,
    rtol: f32,
    atol: f32,
    name: &str,
) {
    assert_eq!(
        actual.shape().dims::<D>(),
        expected.shape().dims::<D>(),
        "{name}: shapes differ"
    );
    assert_data_close(&to_vec_f32(actual), &to_vec_f32(expected), rtol, atol, name);
}
