//! Trainer: batching, gradient accumulation, optimizer and scheduler steps,
//! logging and periodic checkpoints

mod checkpoints;
mod core;
mod result;
mod step;
mod train_loop;


pub use checkpoints::{rotate_checkpoints, sorted_checkpoints, PREFIX_CHECKPOINT_DIR};
pub use core::Trainer;
pub use result::{TrainMetrics, TrainOutput, TRAIN_RESULTS_NAME};
