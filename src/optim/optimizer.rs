//! Optimizer trait

use crate::model::ParameterStore;

/// Trait for optimization algorithms
pub trait Optimizer {
    /// Update every trainable parameter that holds a gradient
    fn step(&mut self, params: &mut ParameterStore);

    /// Drop all gradients
    fn zero_grad(&mut self, params: &mut ParameterStore) {
        params.zero_grad();
    }

    /// Get learning rate
    fn lr(&self) -> f32;

    /// Set learning rate
    fn set_lr(&mut self, lr: f32);
}
