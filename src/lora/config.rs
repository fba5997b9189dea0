//! LoRA adapter configuration
//!
//! Mirrors the PEFT `LoraConfig` fields the fine-tuning run sets: rank,
//! alpha, dropout, task type and the target module names.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// LoRA alpha used for ChatGLM fine-tuning
pub const DEFAULT_LORA_ALPHA: f32 = 32.0;
/// LoRA dropout used for ChatGLM fine-tuning
pub const DEFAULT_LORA_DROPOUT: f32 = 0.1;
/// Default LoRA rank
pub const DEFAULT_LORA_RANK: usize = 8;
/// Fused attention projection adapted in ChatGLM blocks
pub const CHATGLM_TARGET_MODULE: &str = "query_key_value";

/// Kind of model head the adapter is trained for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    /// Causal language modeling
    #[default]
    CausalLm,
    /// Encoder-decoder language modeling
    #[serde(rename = "SEQ_2_SEQ_LM")]
    Seq2SeqLm,
    /// Sequence classification
    SeqCls,
    /// Token classification
    TokenCls,
}

impl TaskType {
    /// PEFT name of the task type
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CausalLm => "CAUSAL_LM",
            Self::Seq2SeqLm => "SEQ_2_SEQ_LM",
            Self::SeqCls => "SEQ_CLS",
            Self::TokenCls => "TOKEN_CLS",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// LoRA adapter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoraConfig {
    /// Rank of the update matrices
    pub r: usize,
    /// Scaling numerator (`scale = lora_alpha / r`)
    pub lora_alpha: f32,
    /// Dropout applied to the adapter input during training
    pub lora_dropout: f32,
    /// Task type
    pub task_type: TaskType,
    /// Adapter frozen for inference
    pub inference_mode: bool,
    /// Module names (last path segment) that receive an adapter
    pub target_modules: BTreeSet<String>,
    /// Layer indices to adapt (`None` = every layer)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layers: Option<Vec<usize>>,
}

impl Default for LoraConfig {
    fn default() -> Self {
        Self::new(DEFAULT_LORA_RANK)
    }
}

impl LoraConfig {
    /// ChatGLM defaults for the given rank: alpha 32, dropout 0.1, causal LM,
    /// training mode, `query_key_value` targeted
    #[must_use]
    pub fn new(r: usize) -> Self {
        Self {
            r,
            lora_alpha: DEFAULT_LORA_ALPHA,
            lora_dropout: DEFAULT_LORA_DROPOUT,
            task_type: TaskType::CausalLm,
            inference_mode: false,
            target_modules: std::iter::once(CHATGLM_TARGET_MODULE.to_string()).collect(),
            layers: None,
        }
    }

    /// Set alpha
    #[must_use]
    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.lora_alpha = alpha;
        self
    }

    /// Set dropout probability
    #[must_use]
    pub fn with_dropout(mut self, dropout: f32) -> Self {
        self.lora_dropout = dropout;
        self
    }

    /// Set task type
    #[must_use]
    pub fn with_task_type(mut self, task_type: TaskType) -> Self {
        self.task_type = task_type;
        self
    }

    /// Set inference mode
    #[must_use]
    pub fn with_inference_mode(mut self, inference_mode: bool) -> Self {
        self.inference_mode = inference_mode;
        self
    }

    /// Replace the target module names
    #[must_use]
    pub fn target_modules(mut self, modules: &[&str]) -> Self {
        self.target_modules = modules.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Restrict adaptation to specific layer indices
    #[must_use]
    pub fn target_layers(mut self, layer_indices: &[usize]) -> Self {
        self.layers = Some(layer_indices.to_vec());
        self
    }

    /// Multiplier applied to the low-rank update
    #[must_use]
    pub fn scale(&self) -> f32 {
        self.lora_alpha / self.r as f32
    }

    /// Whether a linear layer (full dotted name) receives an adapter
    #[must_use]
    pub fn should_apply(&self, layer_name: &str) -> bool {
        let module = layer_name.rsplit('.').next().unwrap_or(layer_name);
        if !self.target_modules.contains(module) {
            return false;
        }
        match (&self.layers, layer_index(layer_name)) {
            (Some(layers), Some(idx)) => layers.contains(&idx),
            _ => true,
        }
    }

    /// Check hyperparameter ranges
    ///
    /// # Errors
    /// Rank must be positive, alpha positive, dropout in `[0, 1)` and at
    /// least one target module given.
    pub fn validate(&self) -> Result<()> {
        if self.r == 0 {
            return Err(Error::ConfigError("LoRA rank must be > 0".into()));
        }
        if self.lora_alpha <= 0.0 {
            return Err(Error::ConfigError(format!(
                "LoRA alpha must be > 0, got {}",
                self.lora_alpha
            )));
        }
        if !(0.0..1.0).contains(&self.lora_dropout) {
            return Err(Error::ConfigError(format!(
                "LoRA dropout must be in [0, 1), got {}",
                self.lora_dropout
            )));
        }
        if self.target_modules.is_empty() {
            return Err(Error::ConfigError("LoRA target modules cannot be empty".into()));
        }
        Ok(())
    }
}

/// Index following a `layers` path segment, e.g. `transformer.layers.3.attention`
fn layer_index(name: &str) -> Option<usize> {
    let mut parts = name.split('.');
    while let Some(part) = parts.next() {
        if part == "layers" || part == "h" {
            return parts.next().and_then(|idx| idx.parse().ok());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_chatglm_defaults() {
        let config = LoraConfig::new(8);
        assert_eq!(config.r, 8);
        assert_relative_eq!(config.lora_alpha, 32.0);
        assert_relative_eq!(config.lora_dropout, 0.1);
        assert_eq!(config.task_type, TaskType::CausalLm);
        assert!(!config.inference_mode);
        assert!(config.target_modules.contains("query_key_value"));
        assert_relative_eq!(config.scale(), 4.0);
    }

    #[test]
    fn test_should_apply_by_module_name() {
        let config = LoraConfig::new(4);
        assert!(config.should_apply("transformer.layers.0.attention.query_key_value"));
        assert!(!config.should_apply("transformer.layers.0.attention.dense"));
        assert!(!config.should_apply("lm_head"));
    }

    #[test]
    fn test_should_apply_layer_filter() {
        let config = LoraConfig::new(4).target_layers(&[1]);
        assert!(!config.should_apply("transformer.layers.0.attention.query_key_value"));
        assert!(config.should_apply("transformer.layers.1.attention.query_key_value"));
    }

    #[test]
    fn test_custom_targets() {
        let config = LoraConfig::new(4).target_modules(&["dense", "dense_h_to_4h"]);
        assert!(config.should_apply("transformer.layers.2.mlp.dense_h_to_4h"));
        assert!(!config.should_apply("transformer.layers.2.attention.query_key_value"));
    }

    #[test]
    fn test_validate() {
        assert!(LoraConfig::new(8).validate().is_ok());
        assert!(LoraConfig::new(0).validate().is_err());
        assert!(LoraConfig::new(8).with_alpha(0.0).validate().is_err());
        assert!(LoraConfig::new(8).with_dropout(1.0).validate().is_err());
        assert!(LoraConfig::new(8).target_modules(&[]).validate().is_err());
    }

    #[test]
    fn test_task_type_serde() {
        let json = serde_json::to_string(&TaskType::CausalLm).unwrap();
        assert_eq!(json, "\"CAUSAL_LM\"");
        assert_eq!(TaskType::CausalLm.to_string(), "CAUSAL_LM");
    }

    proptest! {
        #[test]
        fn prop_scale_is_alpha_over_rank(r in 1usize..256, alpha in 1.0f32..128.0) {
            let config = LoraConfig::new(r).with_alpha(alpha);
            prop_assert!((config.scale() * r as f32 - alpha).abs() < 1e-3);
        }
    }
}
