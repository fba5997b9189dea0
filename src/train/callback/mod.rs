//! Training callbacks
//!
//! Hooks into the trainer's lifecycle: train, epoch and optimizer-step
//! boundaries plus checkpoint saves.

mod manager;
mod progress;
mod traits;

pub use manager::CallbackManager;
pub use progress::ProgressCallback;
pub use traits::{CallbackAction, CallbackContext, TrainerCallback};
