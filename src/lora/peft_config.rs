//! PEFT-compatible adapter_config.json generation
//!
//! Written next to `chatglm-lora.pt` so the run records how the adapters
//! were shaped and which modules they target.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::config::LoraConfig;
use crate::error::Result;

/// File name of the adapter configuration
pub const ADAPTER_CONFIG_NAME: &str = "adapter_config.json";

/// PEFT adapter configuration matching the HuggingFace PEFT schema
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeftAdapterConfig {
    /// PEFT method type (always "LORA")
    pub peft_type: String,
    /// LoRA rank
    pub r: usize,
    /// LoRA alpha scaling parameter
    pub lora_alpha: f32,
    /// Target module names, sorted
    pub target_modules: Vec<String>,
    /// LoRA dropout rate
    pub lora_dropout: f32,
    /// Bias handling: "none", "all", or "lora_only"
    pub bias: String,
    /// Base model name or path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_model_name_or_path: Option<String>,
    /// Task type (e.g., "CAUSAL_LM")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_type: Option<String>,
    #[serde(default)]
    pub fan_in_fan_out: bool,
    #[serde(default)]
    pub inference_mode: bool,
}

impl PeftAdapterConfig {
    /// Build from a [`LoraConfig`]
    pub fn from_lora_config(config: &LoraConfig, base_model: Option<&str>) -> Self {
        Self {
            peft_type: "LORA".to_string(),
            r: config.r,
            lora_alpha: config.lora_alpha,
            target_modules: config.target_modules.iter().cloned().collect(),
            lora_dropout: config.lora_dropout,
            bias: "none".to_string(),
            base_model_name_or_path: base_model.map(String::from),
            task_type: Some(config.task_type.as_str().to_string()),
            fan_in_fan_out: false,
            inference_mode: config.inference_mode,
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON string
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Write `adapter_config.json` into `dir`
    ///
    /// # Errors
    /// Returns error if the directory cannot be created or written.
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        std::fs::write(dir.join(ADAPTER_CONFIG_NAME), self.to_json()?)?;
        Ok(())
    }

    /// Read `adapter_config.json` from `dir`
    ///
    /// # Errors
    /// Returns error if the file is missing or malformed.
    pub fn load(dir: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(dir.join(ADAPTER_CONFIG_NAME))?;
        Ok(Self::from_json(&json)?)
    }
}
