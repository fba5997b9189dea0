//! Periodic `checkpoint-{step}` directories and their rotation

use std::path::{Path, PathBuf};

use super::core::Trainer;
use crate::error::Result;
use crate::model::CausalLm;
use crate::train::TrainerState;

/// Directory name prefix of periodic checkpoints
pub const PREFIX_CHECKPOINT_DIR: &str = "checkpoint";

/// `checkpoint-{step}` directories under `output_dir`, oldest step first
///
/// # Errors
/// Returns error if `output_dir` exists but cannot be listed.
pub fn sorted_checkpoints(output_dir: &Path) -> Result<Vec<(usize, PathBuf)>> {
    if !output_dir.is_dir() {
        return Ok(Vec::new());
    }
    let prefix = format!("{PREFIX_CHECKPOINT_DIR}-");
    let mut checkpoints = Vec::new();
    for entry in std::fs::read_dir(output_dir)? {
        let path = entry?.path();
        let step = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.strip_prefix(&prefix))
            .and_then(|step| step.parse::<usize>().ok());
        if let (Some(step), true) = (step, path.is_dir()) {
            checkpoints.push((step, path));
        }
    }
    checkpoints.sort_by_key(|(step, _)| *step);
    Ok(checkpoints)
}

/// Delete the oldest checkpoints so at most `limit` remain
///
/// Returns the deleted directories. `None` keeps everything.
///
/// # Errors
/// Returns error when a directory cannot be removed.
pub fn rotate_checkpoints(output_dir: &Path, limit: Option<usize>) -> Result<Vec<PathBuf>> {
    let Some(limit) = limit else {
        return Ok(Vec::new());
    };
    let checkpoints = sorted_checkpoints(output_dir)?;
    let excess = checkpoints.len().saturating_sub(limit);
    let mut deleted = Vec::with_capacity(excess);
    for (_, path) in checkpoints.into_iter().take(excess) {
        tracing::info!(dir = %path.display(), "deleting older checkpoint due to save_total_limit");
        std::fs::remove_dir_all(&path)?;
        deleted.push(path);
    }
    Ok(deleted)
}

impl<M: CausalLm> Trainer<M> {
    /// Write weights and trainer state to `output_dir/checkpoint-{step}`
    /// and apply `save_total_limit`
    ///
    /// # Errors
    /// Returns error on write failure.
    pub(crate) fn save_checkpoint(&self, state: &mut TrainerState) -> Result<PathBuf> {
        let dir = self
            .args
            .output_dir
            .join(format!("{PREFIX_CHECKPOINT_DIR}-{}", state.global_step));
        self.save_model(&dir)?;
        state.save(&dir)?;
        rotate_checkpoints(&self.args.output_dir, self.args.save_total_limit)?;
        Ok(dir)
    }
}
