//! LoRA fine-tuning of ChatGLM causal language models
//!
//! Builds ChatGLM training batches (GLM attention masks and 2D position ids,
//! response-only labels), injects LoRA adapters into the attention
//! projections, trains only the adapter weights and saves them to
//! `chatglm-lora.pt`.
//!
//! # Example
//!
//! ```
//! use chatglm_finetune::collate::DataCollator;
//! use chatglm_finetune::data::Example;
//!
//! let collator = DataCollator::new(130_005);
//! let batch = collator
//!     .collate(&[Example::new(vec![5, 6, 7, 8], 2), Example::new(vec![5, 6, 7, 8, 9, 10, 11], 3)])
//!     .unwrap();
//! assert_eq!(batch.input_ids.dim(), (2, 8));
//! assert_eq!(batch.attention_mask.dim(), (2, 1, 8, 8));
//! ```

pub mod checkpoint;
pub mod cli;
pub mod collate;
pub mod config;
pub mod data;
pub mod error;
pub mod lora;
pub mod model;
pub mod optim;
pub mod pipeline;
pub mod train;

pub use error::{Error, Result};
