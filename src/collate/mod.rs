//! Batch collation with GLM attention masks and 2D position ids
//!
//! - [`get_masks_and_position_ids`] builds the per-example mask and positions
//! - [`DataCollator`] pads a list of examples into a [`Batch`]

mod collator;
mod mask;


pub use collator::{Batch, DataCollator};
pub use mask::{get_masks_and_position_ids, MaskOptions};

/// Label value skipped by the causal-LM loss
pub const IGNORE_INDEX: i64 = -100;
