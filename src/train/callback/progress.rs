//! Progress callback for logging training progress

use std::path::Path;

use super::traits::{CallbackAction, CallbackContext, TrainerCallback};

/// Logs epoch boundaries, checkpoints and the end of training
#[derive(Clone, Debug, Default)]
pub struct ProgressCallback;

impl ProgressCallback {
    /// Create progress callback
    pub fn new() -> Self {
        Self
    }
}

impl TrainerCallback for ProgressCallback {
    fn on_train_begin(&mut self, ctx: &CallbackContext) -> CallbackAction {
        tracing::info!(
            num_epochs = ctx.num_epochs,
            max_steps = ctx.max_steps,
            "***** Running training *****"
        );
        CallbackAction::Continue
    }

    fn on_epoch_begin(&mut self, ctx: &CallbackContext) -> CallbackAction {
        tracing::info!("Epoch {}/{} starting (lr: {:.2e})", ctx.epoch + 1, ctx.num_epochs, ctx.lr);
        CallbackAction::Continue
    }

    fn on_epoch_end(&mut self, ctx: &CallbackContext) -> CallbackAction {
        tracing::info!(
            "Epoch {}/{}: step {}/{} loss: {:.4} ({:.1}s)",
            ctx.epoch + 1,
            ctx.num_epochs,
            ctx.global_step,
            ctx.max_steps,
            ctx.loss,
            ctx.elapsed_secs
        );
        CallbackAction::Continue
    }

    fn on_save(&mut self, ctx: &CallbackContext, checkpoint_dir: &Path) {
        tracing::info!(step = ctx.global_step, dir = %checkpoint_dir.display(), "saved checkpoint");
    }

    fn on_train_end(&mut self, ctx: &CallbackContext) {
        tracing::info!(
            global_step = ctx.global_step,
            elapsed_secs = ctx.elapsed_secs,
            "Training completed"
        );
    }

    fn name(&self) -> &'static str {
        "ProgressCallback"
    }
}
