//! Training step operations

use super::core::Trainer;
use crate::collate::Batch;
use crate::error::Result;
use crate::model::{CausalLm, ModelInputs};
use crate::optim::clip_grad_norm;

impl<M: CausalLm> Trainer<M> {
    /// Forward and backward pass for one batch without an optimizer step
    ///
    /// Gradients are scaled by `1 / gradient_accumulation_steps` and add up
    /// across calls until the next optimizer step. Returns the batch loss
    /// scaled the same way.
    ///
    /// # Errors
    /// Returns error when the forward pass fails or reports no loss.
    pub fn training_step(&mut self, batch: &Batch) -> Result<f32> {
        let scale = 1.0 / self.args.gradient_accumulation_steps as f32;
        let inputs = ModelInputs::from_batch(batch);
        let (loss, _) = self.loss.compute_loss(&mut self.model, &inputs, false)?;
        self.model.backward(scale)?;
        Ok(loss * scale)
    }

    /// Clip, update and clear gradients
    ///
    /// Returns the gradient norm before clipping when clipping is enabled.
    pub(crate) fn optimizer_step(&mut self) -> Option<f32> {
        let params = self.model.parameters_mut();
        let grad_norm =
            (self.args.max_grad_norm > 0.0).then(|| clip_grad_norm(params, self.args.max_grad_norm));
        self.optimizer.step(params);
        self.optimizer.zero_grad(params);
        grad_norm
    }
}
