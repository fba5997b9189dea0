//! Loss computation hook of the trainer

use crate::error::{Error, Result};
use crate::model::{CausalLm, CausalLmOutput, ModelInputs};

/// Turns a forward pass into the scalar the trainer minimizes
pub trait ComputeLoss {
    /// Run `model` on `inputs` and return the loss, plus the full output when
    /// `return_outputs` is set.
    ///
    /// # Errors
    /// Returns error when the forward pass fails or yields no loss.
    fn compute_loss(
        &self,
        model: &mut dyn CausalLm,
        inputs: &ModelInputs<'_>,
        return_outputs: bool,
    ) -> Result<(f32, Option<CausalLmOutput>)>;

    /// Name for logging
    fn name(&self) -> &str;
}

/// Uses the loss the model computes from its labels
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatGlmLoss;

impl ComputeLoss for ChatGlmLoss {
    fn compute_loss(
        &self,
        model: &mut dyn CausalLm,
        inputs: &ModelInputs<'_>,
        return_outputs: bool,
    ) -> Result<(f32, Option<CausalLmOutput>)> {
        let output = model.forward(inputs)?;
        let loss = output.loss.ok_or(Error::MissingLoss)?;
        Ok((loss, return_outputs.then_some(output)))
    }

    fn name(&self) -> &str {
        "chatglm_loss"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collate::DataCollator;
    use crate::data::Example;
    use crate::model::{GlmForCausalLm, ModelConfig};

    fn model_and_batch() -> (GlmForCausalLm, crate::collate::Batch) {
        let config = ModelConfig::tiny(10, 4);
        let batch = DataCollator::new(config.eos_token_id)
            .collate(&[Example::new(vec![1, 2, 3], 2)])
            .unwrap();
        (GlmForCausalLm::init(config, 0).unwrap(), batch)
    }

    #[test]
    fn test_returns_model_loss() {
        let (mut model, batch) = model_and_batch();
        let inputs = ModelInputs::from_batch(&batch);

        let (loss, output) = ChatGlmLoss.compute_loss(&mut model, &inputs, true).unwrap();
        let output = output.unwrap();
        assert_eq!(Some(loss), output.loss);
        assert_eq!(output.logits.dim().0, 1);
    }

    #[test]
    fn test_without_outputs() {
        let (mut model, batch) = model_and_batch();
        let inputs = ModelInputs::from_batch(&batch);
        let (_, output) = ChatGlmLoss.compute_loss(&mut model, &inputs, false).unwrap();
        assert!(output.is_none());
    }

    #[test]
    fn test_missing_labels() {
        let (mut model, batch) = model_and_batch();
        let inputs = ModelInputs::new(batch.input_ids.view());
        assert!(matches!(
            ChatGlmLoss.compute_loss(&mut model, &inputs, false),
            Err(Error::MissingLoss)
        ));
    }
}
