//! Turning a pretrained model into a trainable one

use std::path::Path;

use super::device::ComputeDevice;
use super::glm::GlmForCausalLm;
use super::head::CastOutputToFloat;
use super::precision::Precision;
use super::traits::CausalLm;
use crate::error::Result;

/// Load the pretrained model at `model_path` for `device`, optionally
/// overriding the compute precision of its config
///
/// # Errors
/// Returns error when the config or weights cannot be read.
pub fn load_pretrained(
    model_path: &Path,
    device: ComputeDevice,
    dtype: Option<Precision>,
) -> Result<GlmForCausalLm> {
    tracing::info!(path = %model_path.display(), %device, dtype = ?dtype, "loading model");
    GlmForCausalLm::from_pretrained_with_dtype(model_path, dtype)
}

/// Runtime flags for fine-tuning: no key/value cache, model parallel
/// layout, and logits always promoted to f32.
pub fn prepare_for_training(model: &mut dyn CausalLm) {
    let config = model.config_mut();
    config.use_cache = false;
    config.is_parallelizable = true;
    config.model_parallel = true;

    model.wrap_output_head(CastOutputToFloat::boxed);
    model.set_training(true);
    tracing::debug!(
        head_precision = %model.output_head().output_precision(),
        "prepared model for training"
    );
}
