//! Training: loss hook, callbacks, trainer state and the trainer itself

pub mod callback;
mod loss;
mod state;
mod trainer;

pub use callback::{CallbackAction, CallbackContext, CallbackManager, ProgressCallback, TrainerCallback};
pub use loss::{ChatGlmLoss, ComputeLoss};
pub use state::{LogEntry, TrainerState, TRAINER_STATE_NAME};
pub use trainer::{
    rotate_checkpoints, sorted_checkpoints, TrainMetrics, TrainOutput, Trainer, PREFIX_CHECKPOINT_DIR,
    TRAIN_RESULTS_NAME,
};
