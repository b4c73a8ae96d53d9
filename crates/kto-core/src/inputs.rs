//! Input bundle for the linear + KTO loss, with shape validation and batch
//! slicing.

use std::ops::Range;

use burn::tensor::{backend::AutodiffBackend, backend::Backend, Int, Tensor};

use crate::{
    config::KtoLossConfig,
    error::{KtoError, KtoResult},
};

/// Validated dimensions of a [`KtoInputs`] bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KtoDims {
    pub batch: usize,
    pub seq_len: usize,
    pub hidden: usize,
    pub vocab: usize,
}

impl KtoDims {
    /// Index of the first rejected example; examples below it are chosen.
    #[must_use]
    pub fn half(&self) -> usize {
        self.batch / 2
    }
}

/// Inputs to the fused and unfused KTO loss paths.
///
/// The first half of the batch dimension holds chosen examples, the second
/// half rejected ones, paired positionally. Reference tensors are optional
/// and only consulted when the config enables the reference model; they are
/// frozen and never receive gradients.
#[derive(Clone)]
pub struct KtoInputs<B: Backend> {
    /// Policy projection weight, `[vocab, hidden]`.
    pub weight: Tensor<B, 2>,
    /// Hidden states, `[batch, seq_len, hidden]`.
    pub input: Tensor<B, 3>,
    /// Target token ids, `[batch, seq_len]`, with the ignore sentinel
    /// marking excluded positions.
    pub target: Tensor<B, 2, Int>,
    /// Policy projection bias, `[vocab]`.
    pub bias: Option<Tensor<B, 1>>,
    /// Reference hidden states, `[batch, seq_len, hidden]`.
    pub ref_input: Option<Tensor<B, 3>>,
    /// Reference projection weight, `[vocab, hidden]`.
    pub ref_weight: Option<Tensor<B, 2>>,
    /// Reference projection bias, `[vocab]`.
    pub ref_bias: Option<Tensor<B, 1>>,
}

impl<B: Backend> KtoInputs<B> {
    /// Validate all shapes and the batch precondition, returning the
    /// dimensions every downstream computation assumes.
    ///
    /// Runs before any chunk work so that failures never leave partial
    /// results behind.
    pub fn validate(&self, config: &KtoLossConfig) -> KtoResult<KtoDims> {
        config.validate()?;

        let [batch, seq_len, hidden] = self.input.shape().dims();
        let [vocab, weight_hidden] = self.weight.shape().dims();

        if weight_hidden != hidden {
            return Err(KtoError::ShapeMismatch {
                what: "policy weight",
                expected: vec![vocab, hidden],
                found: vec![vocab, weight_hidden],
            });
        }

        let [target_batch, target_seq] = self.target.shape().dims();
        if target_batch != batch || target_seq != seq_len {
            return Err(KtoError::ShapeMismatch {
                what: "target",
                expected: vec![batch, seq_len],
                found: vec![target_batch, target_seq],
            });
        }

        if batch == 0 {
            return Err(KtoError::EmptyBatch);
        }
        if batch % 2 != 0 {
            return Err(KtoError::OddBatch { batch });
        }

        if let Some(bias) = &self.bias {
            let [bias_len] = bias.shape().dims();
            if bias_len != vocab {
                return Err(KtoError::ShapeMismatch {
                    what: "policy bias",
                    expected: vec![vocab],
                    found: vec![bias_len],
                });
            }
        }

        if config.use_ref_model {
            let Some(ref_input) = &self.ref_input else {
                return Err(KtoError::Config(
                    "use_ref_model is set but ref_input is missing".into(),
                ));
            };
            let Some(ref_weight) = &self.ref_weight else {
                return Err(KtoError::Config(
                    "use_ref_model is set but ref_weight is missing".into(),
                ));
            };

            let ref_input_dims = ref_input.shape().dims::<3>();
            if ref_input_dims != [batch, seq_len, hidden] {
                return Err(KtoError::ShapeMismatch {
                    what: "ref_input",
                    expected: vec![batch, seq_len, hidden],
                    found: ref_input_dims.to_vec(),
                });
            }
            let ref_weight_dims = ref_weight.shape().dims::<2>();
            if ref_weight_dims != [vocab, hidden] {
                return Err(KtoError::ShapeMismatch {
                    what: "ref_weight",
                    expected: vec![vocab, hidden],
                    found: ref_weight_dims.to_vec(),
                });
            }
            if let Some(ref_bias) = &self.ref_bias {
                let [ref_bias_len] = ref_bias.shape().dims();
                if ref_bias_len != vocab {
                    return Err(KtoError::ShapeMismatch {
                        what: "ref_bias",
                        expected: vec![vocab],
                        found: vec![ref_bias_len],
                    });
                }
            }
        }

        Ok(KtoDims {
            batch,
            seq_len,
            hidden,
            vocab,
        })
    }

    /// Slice the batch-dependent tensors to `range`; weights and biases are
    /// shared across chunks and returned as-is.
    #[must_use]
    pub fn slice_batch(&self, range: Range<usize>) -> Self {
        Self {
            weight: self.weight.clone(),
            input: self.input.clone().slice([range.clone()]),
            target: self.target.clone().slice([range.clone()]),
            bias: self.bias.clone(),
            ref_input: self.ref_input.clone().map(|t| t.slice([range.clone()])),
            ref_weight: self.ref_weight.clone(),
            ref_bias: self.ref_bias.clone(),
        }
    }
}

impl<B: AutodiffBackend> KtoInputs<B> {
    /// Strip gradient tracking, moving the bundle to the inner backend.
    /// The fused path re-lifts per-chunk slices into fresh graphs.
    #[must_use]
    pub fn inner(self) -> KtoInputs<B::InnerBackend> {
        KtoInputs {
            weight: self.weight.inner(),
            input: self.input.inner(),
            target: self.target.inner(),
            bias: self.bias.map(Tensor::inner),
            ref_input: self.ref_input.map(Tensor::inner),
            ref_weight: self.ref_weight.map(Tensor::inner),
            ref_bias: self.ref_bias.map(Tensor::inner),
        }
    }
}
