//! Causal language model boundary
//!
//! The trainer, collator and checkpoint code only see models through
//! [`CausalLm`]. [`GlmForCausalLm`](super::GlmForCausalLm) is the in-crate
//! implementation.

use ndarray::{Array3, ArrayView2, ArrayView3, ArrayView4};

use super::config::ModelConfig;
use super::head::OutputHead;
use super::params::ParameterStore;
use crate::collate::{Batch, IGNORE_INDEX};
use crate::error::Result;
use crate::lora::AdapterRegistry;

/// Inputs of a forward pass
#[derive(Debug, Clone, Copy)]
pub struct ModelInputs<'a> {
    /// Token ids `(B, L)`
    pub input_ids: ArrayView2<'a, i64>,
    /// `true` = attention disallowed, `(B, 1, L, L)`; causal when absent
    pub attention_mask: Option<ArrayView4<'a, bool>>,
    /// Position ids `(B, P, L)`; sequential when absent
    pub position_ids: Option<ArrayView3<'a, i64>>,
    /// Targets `(B, L)`; the loss is only computed when present
    pub labels: Option<ArrayView2<'a, i64>>,
    /// Label value excluded from the loss
    pub ignore_index: i64,
}

impl<'a> ModelInputs<'a> {
    /// Inputs with token ids only
    #[must_use]
    pub fn new(input_ids: ArrayView2<'a, i64>) -> Self {
        Self {
            input_ids,
            attention_mask: None,
            position_ids: None,
            labels: None,
            ignore_index: IGNORE_INDEX,
        }
    }

    /// All four tensors of a collated batch
    #[must_use]
    pub fn from_batch(batch: &'a Batch) -> Self {
        Self {
            input_ids: batch.input_ids.view(),
            attention_mask: Some(batch.attention_mask.view()),
            position_ids: Some(batch.position_ids.view()),
            labels: Some(batch.labels.view()),
            ignore_index: batch.ignore_index,
        }
    }
}

/// Result of a forward pass
#[derive(Debug, Clone)]
pub struct CausalLmOutput {
    /// Mean shifted cross-entropy over non-ignored labels
    pub loss: Option<f32>,
    /// Full-precision logits `(B, L, V)`
    pub logits: Array3<f32>,
}

/// Function replacing a model's output head (see [`CausalLm::wrap_output_head`])
pub type HeadWrapper = fn(Box<dyn OutputHead>) -> Box<dyn OutputHead>;

/// A trainable causal language model
pub trait CausalLm {
    /// Architecture and runtime flags
    fn config(&self) -> &ModelConfig;

    /// Mutable architecture and runtime flags
    fn config_mut(&mut self) -> &mut ModelConfig;

    /// Named parameters
    fn parameters(&self) -> &ParameterStore;

    /// Mutable named parameters
    fn parameters_mut(&mut self) -> &mut ParameterStore;

    /// Prefix prepended to parameter names in saved state dicts
    fn parameter_prefix(&self) -> &str {
        ""
    }

    /// Linear layers that can carry an adapter
    fn linear_layers(&self) -> Vec<LinearSpec>;

    /// Layers that currently carry an adapter
    fn adapters(&self) -> &AdapterRegistry;

    /// Mutable adapter registry
    fn adapters_mut(&mut self) -> &mut AdapterRegistry;

    /// Replace the output head with `wrap(current_head)`
    fn wrap_output_head(&mut self, wrap: HeadWrapper);

    /// The output head
    fn output_head(&self) -> &dyn OutputHead;

    /// Switch between training (dropout on) and evaluation
    fn set_training(&mut self, training: bool);

    /// Whether dropout is active
    fn is_training(&self) -> bool;

    /// Run the model. With labels, also caches what [`CausalLm::backward`]
    /// needs.
    ///
    /// # Errors
    /// Returns error on shape mismatch or out-of-range token/position ids.
    fn forward(&mut self, inputs: &ModelInputs<'_>) -> Result<CausalLmOutput>;

    /// Accumulate `scale * d(loss)/d(param)` into every trainable parameter
    /// for the most recent forward pass with labels.
    ///
    /// # Errors
    /// Returns error when no forward pass with labels preceded the call.
    fn backward(&mut self, scale: f32) -> Result<()>;
}

/// Shape of an adaptable linear layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearSpec {
    /// Dotted module name, weights live at `{name}.weight`
    pub name: String,
    /// Input features
    pub in_features: usize,
    /// Output features
    pub out_features: usize,
}

impl LinearSpec {
    /// Create a spec
    pub fn new(name: impl Into<String>, in_features: usize, out_features: usize) -> Self {
        Self { name: name.into(), in_features, out_features }
    }
}
