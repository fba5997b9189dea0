//! CLI argument parsing
//!
//! # Usage
//!
//! ```bash
//! chatglm-finetune finetune --dataset-path data/alpaca --model-path THUDM/chatglm-6b \
//!     --lora-rank 8 --output-dir output --max-steps 52000 --save-steps 1000
//! chatglm-finetune finetune --config run.yaml --learning-rate 2e-5
//! chatglm-finetune inspect data/alpaca
//! ```

mod core;

#[cfg(test)]
mod tests;

pub use core::{apply_overrides, parse_args, Cli, Command, FinetuneArgs, InspectArgs, TrainingOverrides};
