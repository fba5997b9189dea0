//! Trainer progress written next to each checkpoint

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// File name of the serialized [`TrainerState`]
pub const TRAINER_STATE_NAME: &str = "trainer_state.json";

/// One logging interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Optimizer step the entry was taken at
    pub step: usize,
    /// Fractional epoch
    pub epoch: f64,
    /// Mean loss since the previous entry
    pub loss: f32,
    pub learning_rate: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grad_norm: Option<f32>,
}

/// Progress of a training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerState {
    pub global_step: usize,
    pub max_steps: usize,
    /// Fractional epoch
    pub epoch: f64,
    pub num_train_epochs: usize,
    pub train_batch_size: usize,
    pub logging_steps: usize,
    pub save_steps: usize,
    pub log_history: Vec<LogEntry>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TrainerState {
    /// Fresh state for a run
    pub fn new(
        max_steps: usize,
        num_train_epochs: usize,
        train_batch_size: usize,
        logging_steps: usize,
        save_steps: usize,
    ) -> Self {
        let now = Utc::now();
        Self {
            global_step: 0,
            max_steps,
            epoch: 0.0,
            num_train_epochs,
            train_batch_size,
            logging_steps,
            save_steps,
            log_history: Vec::new(),
            started_at: now,
            updated_at: now,
        }
    }

    /// Record a logging interval
    pub fn log(&mut self, entry: LogEntry) {
        self.log_history.push(entry);
    }

    /// Write `trainer_state.json` into `dir`
    ///
    /// # Errors
    /// Returns error on serialization or write failure.
    pub fn save(&mut self, dir: &Path) -> Result<()> {
        self.updated_at = Utc::now();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(dir.join(TRAINER_STATE_NAME), json)?;
        Ok(())
    }

    /// Read `trainer_state.json` from `dir`
    ///
    /// # Errors
    /// Returns error if the file is missing or malformed.
    pub fn load(dir: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(dir.join(TRAINER_STATE_NAME))?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_load() {
        let dir = TempDir::new().unwrap();
        let mut state = TrainerState::new(10, 2, 4, 1, 5);
        state.global_step = 5;
        state.epoch = 1.0;
        state.log(LogEntry { step: 5, epoch: 1.0, loss: 2.5, learning_rate: 1e-4, grad_norm: None });
        state.save(dir.path()).unwrap();

        let loaded = TrainerState::load(dir.path()).unwrap();
        assert_eq!(loaded, state);
        assert!(loaded.updated_at >= loaded.started_at);
    }

    #[test]
    fn test_grad_norm_omitted_when_absent() {
        let entry = LogEntry { step: 1, epoch: 0.5, loss: 1.0, learning_rate: 0.0, grad_norm: None };
        let json = serde_json::to_string(&entry).unwrap();
        assert!(!json.contains("grad_norm"));
    }

    #[test]
    fn test_load_missing() {
        let dir = TempDir::new().unwrap();
        assert!(TrainerState::load(dir.path()).is_err());
    }
}
