//! Model configuration (`config.json`) and special tokens

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::precision::Precision;
use crate::error::{Error, Result};

/// ChatGLM-6B end-of-sequence (`<eop>`) token id
pub const CHATGLM_EOS_TOKEN_ID: i64 = 130_005;
/// ChatGLM-6B beginning-of-sequence (`<sop>`) token id
pub const CHATGLM_BOS_TOKEN_ID: i64 = 130_004;
/// ChatGLM-6B `[MASK]` token id
pub const CHATGLM_MASK_TOKEN_ID: i64 = 130_000;
/// ChatGLM-6B `[gMASK]` token id
pub const CHATGLM_GMASK_TOKEN_ID: i64 = 130_001;
/// ChatGLM-6B padding token id
pub const CHATGLM_PAD_TOKEN_ID: i64 = 3;

fn default_eos() -> i64 {
    CHATGLM_EOS_TOKEN_ID
}
fn default_bos() -> i64 {
    CHATGLM_BOS_TOKEN_ID
}
fn default_mask() -> i64 {
    CHATGLM_MASK_TOKEN_ID
}
fn default_gmask() -> i64 {
    CHATGLM_GMASK_TOKEN_ID
}
fn default_pad() -> i64 {
    CHATGLM_PAD_TOKEN_ID
}
fn default_true() -> bool {
    true
}
fn default_num_layers() -> usize {
    1
}
fn default_max_sequence_length() -> usize {
    2048
}
fn default_model_type() -> String {
    "chatglm".to_string()
}

/// Architecture and runtime flags of a causal LM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model family
    #[serde(default = "default_model_type")]
    pub model_type: String,
    /// Vocabulary size
    pub vocab_size: usize,
    /// Hidden size
    pub hidden_size: usize,
    /// Number of blocks
    #[serde(default = "default_num_layers")]
    pub num_layers: usize,
    /// Longest supported position id + 1
    #[serde(default = "default_max_sequence_length")]
    pub max_sequence_length: usize,
    /// Absolute + block position embeddings
    #[serde(default = "default_true")]
    pub position_encoding_2d: bool,
    /// End-of-sequence token id
    #[serde(default = "default_eos")]
    pub eos_token_id: i64,
    /// Beginning-of-sequence token id
    #[serde(default = "default_bos")]
    pub bos_token_id: i64,
    /// `[MASK]` token id
    #[serde(default = "default_mask")]
    pub mask_token_id: i64,
    /// `[gMASK]` token id
    #[serde(default = "default_gmask")]
    pub gmask_token_id: i64,
    /// Padding token id
    #[serde(default = "default_pad")]
    pub pad_token_id: i64,
    /// Reuse key/value states between calls (inference only)
    #[serde(default = "default_true")]
    pub use_cache: bool,
    /// Compute precision of the weights
    #[serde(default)]
    pub torch_dtype: Precision,
    /// Model may be split across devices by the trainer
    #[serde(skip)]
    pub is_parallelizable: bool,
    /// Model is already split across devices
    #[serde(skip)]
    pub model_parallel: bool,
}

impl ModelConfig {
    /// Small config for tests and smoke runs
    #[must_use]
    pub fn tiny(vocab_size: usize, hidden_size: usize) -> Self {
        Self {
            model_type: default_model_type(),
            vocab_size,
            hidden_size,
            num_layers: 1,
            max_sequence_length: 64,
            position_encoding_2d: true,
            eos_token_id: (vocab_size as i64) - 1,
            bos_token_id: (vocab_size as i64) - 2,
            mask_token_id: (vocab_size as i64) - 3,
            gmask_token_id: (vocab_size as i64) - 4,
            pad_token_id: 0,
            use_cache: true,
            torch_dtype: Precision::Fp32,
            is_parallelizable: false,
            model_parallel: false,
        }
    }

    /// Read `<model_dir>/config.json`
    ///
    /// # Errors
    /// Returns error if the file is missing or malformed.
    pub fn from_model_dir(model_dir: &Path) -> Result<Self> {
        let path = model_dir.join("config.json");
        let json = std::fs::read_to_string(&path).map_err(|e| {
            Error::ConfigError(format!("Failed to read model config {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|e| {
            Error::ConfigError(format!("Failed to parse model config {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write `<model_dir>/config.json`
    ///
    /// # Errors
    /// Returns error on serialization or write failure.
    pub fn save(&self, model_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(model_dir)?;
        std::fs::write(model_dir.join("config.json"), serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Check sizes are usable
    ///
    /// # Errors
    /// Returns error on zero sizes or special tokens outside the vocabulary.
    pub fn validate(&self) -> Result<()> {
        if self.vocab_size == 0 || self.hidden_size == 0 || self.max_sequence_length == 0 {
            return Err(Error::ConfigError(
                "vocab_size, hidden_size and max_sequence_length must be > 0".into(),
            ));
        }
        if self.eos_token_id < 0 || self.eos_token_id as usize >= self.vocab_size {
            return Err(Error::ConfigError(format!(
                "eos_token_id {} outside vocabulary of {}",
                self.eos_token_id, self.vocab_size
            )));
        }
        Ok(())
    }

    /// Special token ids
    #[must_use]
    pub fn special_tokens(&self) -> SpecialTokens {
        SpecialTokens {
            eos_token_id: self.eos_token_id,
            bos_token_id: self.bos_token_id,
            mask_token_id: self.mask_token_id,
            gmask_token_id: self.gmask_token_id,
            pad_token_id: self.pad_token_id,
        }
    }
}

/// Token ids the collator and trainer need from the tokenizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialTokens {
    /// End of sequence, used for padding and as the final label
    pub eos_token_id: i64,
    /// Start of the response
    pub bos_token_id: i64,
    /// `[MASK]`
    pub mask_token_id: i64,
    /// `[gMASK]`
    pub gmask_token_id: i64,
    /// Padding
    pub pad_token_id: i64,
}

impl Default for SpecialTokens {
    fn default() -> Self {
        Self {
            eos_token_id: CHATGLM_EOS_TOKEN_ID,
            bos_token_id: CHATGLM_BOS_TOKEN_ID,
            mask_token_id: CHATGLM_MASK_TOKEN_ID,
            gmask_token_id: CHATGLM_GMASK_TOKEN_ID,
            pad_token_id: CHATGLM_PAD_TOKEN_ID,
        }
    }
}

/// Load the tokenizer's special tokens from a model directory.
///
/// Reads `config.json`; ids missing there fall back to the ChatGLM-6B values.
///
/// # Errors
/// Returns error if `config.json` cannot be read.
pub fn load_special_tokens(model_dir: &Path) -> Result<SpecialTokens> {
    Ok(ModelConfig::from_model_dir(model_dir)?.special_tokens())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CHATGLM_6B_CONFIG: &str = r#"{
        "architectures": ["ChatGLMModel"],
        "bos_token_id": 130004,
        "eos_token_id": 130005,
        "mask_token_id": 130000,
        "gmask_token_id": 130001,
        "pad_token_id": 3,
        "hidden_size": 4096,
        "inner_hidden_size": 16384,
        "layernorm_epsilon": 1e-05,
        "max_sequence_length": 2048,
        "model_type": "chatglm",
        "num_attention_heads": 32,
        "num_layers": 28,
        "position_encoding_2d": true,
        "torch_dtype": "float16",
        "use_cache": true,
        "vocab_size": 130528
    }"#;

    #[test]
    fn test_parse_chatglm_6b_config() {
        let config: ModelConfig = serde_json::from_str(CHATGLM_6B_CONFIG).unwrap();
        assert_eq!(config.vocab_size, 130_528);
        assert_eq!(config.num_layers, 28);
        assert_eq!(config.torch_dtype, Precision::Fp16);
        assert!(config.use_cache);
        assert!(!config.is_parallelizable);
        assert_eq!(config.special_tokens(), SpecialTokens::default());
    }

    #[test]
    fn test_load_from_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.json"), CHATGLM_6B_CONFIG).unwrap();
        let tokens = load_special_tokens(dir.path()).unwrap();
        assert_eq!(tokens.eos_token_id, CHATGLM_EOS_TOKEN_ID);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let config = ModelConfig::tiny(32, 8);
        config.save(dir.path()).unwrap();
        assert_eq!(ModelConfig::from_model_dir(dir.path()).unwrap(), config);
    }

    #[test]
    fn test_missing_config() {
        let dir = TempDir::new().unwrap();
        let err = ModelConfig::from_model_dir(dir.path()).unwrap_err();
        assert!(err.to_string().contains("config.json"));
    }

    #[test]
    fn test_eos_outside_vocab_rejected() {
        let mut config = ModelConfig::tiny(16, 4);
        config.eos_token_id = 16;
        assert!(config.validate().is_err());
    }
}
