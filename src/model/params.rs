//! Named model parameters with gradient tracking

use std::collections::BTreeMap;

use ndarray::{ArrayD, ArrayView1, ArrayView2, Ix1, Ix2};

use crate::error::{Error, Result};

/// A model weight with an optional accumulated gradient
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    data: ArrayD<f32>,
    grad: Option<ArrayD<f32>>,
    requires_grad: bool,
}

impl Parameter {
    /// Create a parameter
    pub fn new(data: ArrayD<f32>, requires_grad: bool) -> Self {
        Self { data, grad: None, requires_grad }
    }

    /// Weight values
    pub fn data(&self) -> &ArrayD<f32> {
        &self.data
    }

    /// Mutable weight values
    pub fn data_mut(&mut self) -> &mut ArrayD<f32> {
        &mut self.data
    }

    /// Replace the weight values, keeping the shape
    ///
    /// # Errors
    /// Returns [`Error::ShapeMismatch`] when `data` has a different shape.
    pub fn assign(&mut self, data: ArrayD<f32>) -> Result<()> {
        if data.shape() != self.data.shape() {
            return Err(Error::ShapeMismatch {
                expected: self.data.shape().to_vec(),
                got: data.shape().to_vec(),
            });
        }
        self.data = data;
        Ok(())
    }

    /// Accumulated gradient, if any
    pub fn grad(&self) -> Option<&ArrayD<f32>> {
        self.grad.as_ref()
    }

    /// Overwrite the gradient
    pub fn set_grad(&mut self, grad: ArrayD<f32>) {
        self.grad = Some(grad);
    }

    /// Add to the gradient (gradient accumulation across micro-batches)
    pub fn accumulate_grad(&mut self, grad: &ArrayD<f32>) {
        match self.grad.as_mut() {
            Some(existing) => *existing += grad,
            None => self.grad = Some(grad.clone()),
        }
    }

    /// Drop the gradient
    pub fn zero_grad(&mut self) {
        self.grad = None;
    }

    /// Whether the optimizer updates this parameter
    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    /// Enable or disable gradient tracking
    pub fn set_requires_grad(&mut self, requires_grad: bool) {
        self.requires_grad = requires_grad;
        if !requires_grad {
            self.grad = None;
        }
    }

    /// Shape of the weight
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Name-ordered parameter collection (the model's `named_parameters`)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterStore {
    params: BTreeMap<String, Parameter>,
}

impl ParameterStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a parameter
    pub fn insert(&mut self, name: impl Into<String>, param: Parameter) {
        self.params.insert(name.into(), param);
    }

    /// Parameter by name
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.params.get(name)
    }

    /// Mutable parameter by name
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.params.get_mut(name)
    }

    /// Parameter by name, error if absent
    ///
    /// # Errors
    /// Returns [`Error::Model`] when no parameter has that name.
    pub fn require(&self, name: &str) -> Result<&Parameter> {
        self.params.get(name).ok_or_else(|| Error::Model(format!("missing parameter {name}")))
    }

    /// Mutable parameter by name, error if absent
    ///
    /// # Errors
    /// Returns [`Error::Model`] when no parameter has that name.
    pub fn require_mut(&mut self, name: &str) -> Result<&mut Parameter> {
        self.params.get_mut(name).ok_or_else(|| Error::Model(format!("missing parameter {name}")))
    }

    /// Two-dimensional view of a parameter
    ///
    /// # Errors
    /// Returns error when absent or not a matrix.
    pub fn matrix(&self, name: &str) -> Result<ArrayView2<'_, f32>> {
        self.require(name)?
            .data()
            .view()
            .into_dimensionality::<Ix2>()
            .map_err(|e| Error::Model(format!("{name} is not a matrix: {e}")))
    }

    /// One-dimensional view of a parameter
    ///
    /// # Errors
    /// Returns error when absent or not a vector.
    pub fn vector(&self, name: &str) -> Result<ArrayView1<'_, f32>> {
        self.require(name)?
            .data()
            .view()
            .into_dimensionality::<Ix1>()
            .map_err(|e| Error::Model(format!("{name} is not a vector: {e}")))
    }

    /// Whether a parameter exists
    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    /// All `(name, parameter)` pairs in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Parameter)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Mutable `(name, parameter)` pairs in name order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Parameter)> {
        self.params.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    /// Parameters with gradient tracking enabled
    pub fn trainable(&self) -> impl Iterator<Item = (&str, &Parameter)> {
        self.iter().filter(|(_, p)| p.requires_grad())
    }

    /// Mutable parameters with gradient tracking enabled
    pub fn trainable_mut(&mut self) -> Vec<&mut Parameter> {
        self.params.values_mut().filter(|p| p.requires_grad()).collect()
    }

    /// Disable gradient tracking everywhere
    pub fn freeze_all(&mut self) {
        for param in self.params.values_mut() {
            param.set_requires_grad(false);
        }
    }

    /// Drop every gradient
    pub fn zero_grad(&mut self) {
        for param in self.params.values_mut() {
            param.zero_grad();
        }
    }

    /// Total element count
    pub fn num_parameters(&self) -> usize {
        self.params.values().map(Parameter::len).sum()
    }

    /// Element count of trainable parameters
    pub fn num_trainable(&self) -> usize {
        self.trainable().map(|(_, p)| p.len()).sum()
    }

    /// Number of named parameters
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}
