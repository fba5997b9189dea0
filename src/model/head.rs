//! Output projection from hidden states to vocabulary logits

use ndarray::{Array2, ArrayView2};

use super::params::ParameterStore;
use super::precision::Precision;
use crate::error::Result;

/// Head output in the precision it was computed in
#[derive(Debug, Clone, PartialEq)]
pub enum HeadOutput {
    /// Full precision
    F32(Array2<f32>),
    /// Half precision
    F16(Array2<half::f16>),
    /// Brain float
    Bf16(Array2<half::bf16>),
}

impl HeadOutput {
    /// Precision of the stored values
    #[must_use]
    pub fn precision(&self) -> Precision {
        match self {
            Self::F32(_) => Precision::Fp32,
            Self::F16(_) => Precision::Fp16,
            Self::Bf16(_) => Precision::Bf16,
        }
    }

    /// Promote to f32
    #[must_use]
    pub fn into_f32(self) -> Array2<f32> {
        match self {
            Self::F32(values) => values,
            Self::F16(values) => values.mapv(half::f16::to_f32),
            Self::Bf16(values) => values.mapv(half::bf16::to_f32),
        }
    }
}

/// Projection producing logits `(L, V)` from hidden states `(L, H)`
pub trait OutputHead {
    /// Precision of the values [`OutputHead::forward`] returns
    fn output_precision(&self) -> Precision;

    /// Compute logits
    ///
    /// # Errors
    /// Returns error when the head weight is missing or mis-shaped.
    fn forward(&self, params: &ParameterStore, hidden: ArrayView2<'_, f32>) -> Result<HeadOutput>;

    /// Gradient with respect to `hidden`; accumulates the weight gradient
    /// when the head weight is trainable.
    ///
    /// # Errors
    /// Returns error when the head weight is missing or mis-shaped.
    fn backward(
        &self,
        params: &mut ParameterStore,
        hidden: ArrayView2<'_, f32>,
        grad_logits: ArrayView2<'_, f32>,
    ) -> Result<Array2<f32>>;
}

/// Bias-free linear head computing in the model's precision
#[derive(Debug, Clone)]
pub struct LmHead {
    weight: String,
    precision: Precision,
}

impl LmHead {
    /// Head reading its `(V, H)` weight from `weight`
    pub fn new(weight: impl Into<String>, precision: Precision) -> Self {
        Self { weight: weight.into(), precision }
    }
}

impl OutputHead for LmHead {
    fn output_precision(&self) -> Precision {
        self.precision
    }

    fn forward(&self, params: &ParameterStore, hidden: ArrayView2<'_, f32>) -> Result<HeadOutput> {
        let weight = params.matrix(&self.weight)?;
        let logits = hidden.dot(&weight.t());
        Ok(match self.precision {
            Precision::Fp32 => HeadOutput::F32(logits),
            Precision::Fp16 => HeadOutput::F16(logits.mapv(half::f16::from_f32)),
            Precision::Bf16 => HeadOutput::Bf16(logits.mapv(half::bf16::from_f32)),
        })
    }

    fn backward(
        &self,
        params: &mut ParameterStore,
        hidden: ArrayView2<'_, f32>,
        grad_logits: ArrayView2<'_, f32>,
    ) -> Result<Array2<f32>> {
        let grad_hidden = grad_logits.dot(&params.matrix(&self.weight)?);
        let weight = params.require_mut(&self.weight)?;
        if weight.requires_grad() {
            weight.accumulate_grad(&grad_logits.t().dot(&hidden).into_dyn());
        }
        Ok(grad_hidden)
    }
}

/// Wraps a head so its output is always promoted to f32, whatever precision
/// the wrapped head computes in.
pub struct CastOutputToFloat {
    inner: Box<dyn OutputHead>,
}

impl CastOutputToFloat {
    /// Wrap a head
    #[must_use]
    pub fn new(inner: Box<dyn OutputHead>) -> Self {
        Self { inner }
    }

    /// Wrap a head, boxed (usable as a [`HeadWrapper`](super::HeadWrapper))
    #[must_use]
    pub fn boxed(inner: Box<dyn OutputHead>) -> Box<dyn OutputHead> {
        Box::new(Self::new(inner))
    }

    /// Precision the wrapped head computes in
    #[must_use]
    pub fn inner_precision(&self) -> Precision {
        self.inner.output_precision()
    }
}

impl OutputHead for CastOutputToFloat {
    fn output_precision(&self) -> Precision {
        Precision::Fp32
    }

    fn forward(&self, params: &ParameterStore, hidden: ArrayView2<'_, f32>) -> Result<HeadOutput> {
        Ok(HeadOutput::F32(self.inner.forward(params, hidden)?.into_f32()))
    }

    fn backward(
        &self,
        params: &mut ParameterStore,
        hidden: ArrayView2<'_, f32>,
        grad_logits: ArrayView2<'_, f32>,
    ) -> Result<Array2<f32>> {
        self.inner.backward(params, hidden, grad_logits)
    }
}
