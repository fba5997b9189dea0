//! Saving and restoring the trainable (adapter) parameters
//!
//! Only parameters with `requires_grad` are written, under the model's
//! state-dict names (`base_model.model.` prefix for a PEFT model). The file
//! is SafeTensors with `format = pt` metadata.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::lora::{LoraConfig, PeftAdapterConfig};
use crate::model::{read_safetensors, write_safetensors, CausalLm, StateDict};

/// File name of the saved adapter weights
pub const ADAPTER_WEIGHTS_NAME: &str = "chatglm-lora.pt";

/// Trainable parameters of `model` keyed by state-dict name
pub fn tunable_state_dict(model: &dyn CausalLm) -> StateDict {
    let prefix = model.parameter_prefix();
    model
        .parameters()
        .trainable()
        .map(|(name, param)| (format!("{prefix}{name}"), param.data().clone()))
        .collect()
}

/// Write every trainable parameter of `model` to `path`
///
/// Returns the number of tensors written.
///
/// # Errors
/// Returns error on serialization or write failure.
pub fn save_tunable_parameters(model: &dyn CausalLm, path: &Path) -> Result<usize> {
    let state = tunable_state_dict(model);
    write_safetensors(path, &state)?;
    tracing::info!(path = %path.display(), tensors = state.len(), "saved tunable parameters");
    Ok(state.len())
}

/// Read a file written by [`save_tunable_parameters`]
///
/// # Errors
/// Returns error if the file cannot be read or decoded.
pub fn load_tunable_parameters(path: &Path) -> Result<StateDict> {
    read_safetensors(path)
}

/// Write `chatglm-lora.pt` and `adapter_config.json` into `dir`
///
/// # Errors
/// Returns error on write failure.
pub fn save_adapter(
    model: &dyn CausalLm,
    config: &LoraConfig,
    base_model: Option<&str>,
    dir: &Path,
) -> Result<PathBuf> {
    let path = dir.join(ADAPTER_WEIGHTS_NAME);
    save_tunable_parameters(model, &path)?;
    PeftAdapterConfig::from_lora_config(config, base_model).save(dir)?;
    Ok(path)
}

/// Outcome of a non-strict load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Keys copied into the model
    pub loaded: Vec<String>,
    /// Trainable parameters the file did not provide
    pub missing: Vec<String>,
    /// Keys in the file with no matching parameter
    pub unexpected: Vec<String>,
}

impl LoadReport {
    /// Every trainable parameter was restored and nothing was left over
    pub fn is_exact(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty()
    }
}

/// Copy saved adapter weights into `model`, tolerating missing and
/// unexpected keys.
///
/// Keys may carry the model's state-dict prefix or be bare parameter names.
///
/// # Errors
/// Returns error when the file cannot be read or a matching key has a
/// different shape.
pub fn load_adapter(model: &mut dyn CausalLm, path: &Path) -> Result<LoadReport> {
    let state = load_tunable_parameters(path)?;
    let prefix = model.parameter_prefix().to_string();
    let params = model.parameters_mut();

    let mut report = LoadReport::default();
    for (key, value) in state {
        let name = key.strip_prefix(prefix.as_str()).unwrap_or(&key);
        match params.get_mut(name) {
            Some(param) => {
                param.assign(value)?;
                report.loaded.push(name.to_string());
            }
            None => report.unexpected.push(key),
        }
    }
    report.missing = params
        .trainable()
        .map(|(name, _)| name.to_string())
        .filter(|name| !report.loaded.contains(name))
        .collect();

    if !report.missing.is_empty() {
        tracing::warn!(keys = ?report.missing, "missing keys when resuming adapter");
    }
    if !report.unexpected.is_empty() {
        tracing::warn!(keys = ?report.unexpected, "unexpected keys when resuming adapter");
    }
    tracing::info!(path = %path.display(), loaded = report.loaded.len(), "resumed adapter");
    Ok(report)
}
