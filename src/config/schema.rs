//! Configuration schema for a fine-tuning run
//!
//! Two argument groups: [`FinetuneArguments`] (what to fine-tune) and
//! [`TrainingArguments`] (how to train). Both can be read from YAML; missing
//! keys take the defaults below.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::lora::DEFAULT_LORA_RANK;

/// Complete run configuration (YAML root)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FinetuneSpec {
    /// Model, dataset and adapter options
    pub finetune: FinetuneArguments,
    /// Optimization and bookkeeping options
    pub training: TrainingArguments,
}

/// What to fine-tune
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinetuneArguments {
    /// Tokenized dataset (HF `save_to_disk` directory or JSONL file)
    pub dataset_path: PathBuf,
    /// Pretrained model directory
    pub model_path: PathBuf,
    /// LoRA rank
    pub lora_rank: usize,
    /// Resume adapter weights from `resume_path`
    pub is_resume: bool,
    /// Saved adapter file, or a directory holding `chatglm-lora.pt`
    pub resume_path: PathBuf,
}

impl Default for FinetuneArguments {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from("data/alpaca"),
            model_path: PathBuf::from("THUDM/chatglm-6b"),
            lora_rank: DEFAULT_LORA_RANK,
            is_resume: false,
            resume_path: PathBuf::from("output/alpaca_output"),
        }
    }
}

/// How to train
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingArguments {
    /// Where checkpoints and the final adapter are written
    pub output_dir: PathBuf,
    pub num_train_epochs: usize,
    pub per_device_train_batch_size: usize,
    pub gradient_accumulation_steps: usize,
    pub learning_rate: f32,
    pub weight_decay: f32,
    pub adam_beta1: f32,
    pub adam_beta2: f32,
    pub adam_epsilon: f32,
    /// Global gradient norm cap (0 disables clipping)
    pub max_grad_norm: f32,
    /// Total optimizer steps; overrides `num_train_epochs` when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_steps: Option<usize>,
    pub warmup_steps: usize,
    pub logging_steps: usize,
    pub save_steps: usize,
    /// Keep at most this many `checkpoint-*` directories
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_total_limit: Option<usize>,
    pub seed: u64,
    /// Compute the output head in half precision
    pub fp16: bool,
    /// Must stay false: the collator needs the `seq_len` column
    pub remove_unused_columns: bool,
}

impl Default for TrainingArguments {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            num_train_epochs: 3,
            per_device_train_batch_size: 8,
            gradient_accumulation_steps: 1,
            learning_rate: 5e-5,
            weight_decay: 0.0,
            adam_beta1: 0.9,
            adam_beta2: 0.999,
            adam_epsilon: 1e-8,
            max_grad_norm: 1.0,
            max_steps: None,
            warmup_steps: 0,
            logging_steps: 500,
            save_steps: 500,
            save_total_limit: None,
            seed: 42,
            fp16: false,
            remove_unused_columns: false,
        }
    }
}
