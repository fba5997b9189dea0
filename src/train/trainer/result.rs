//! Training result types

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// File name of the serialized [`TrainOutput`]
pub const TRAIN_RESULTS_NAME: &str = "train_results.json";

/// Throughput and progress of a finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainMetrics {
    /// Wall-clock seconds
    pub train_runtime: f64,
    pub train_samples_per_second: f64,
    pub train_steps_per_second: f64,
    /// Fractional epoch reached
    pub epoch: f64,
}

/// Result of a training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainOutput {
    /// Optimizer steps taken
    pub global_step: usize,
    /// Mean loss over all optimizer steps
    pub training_loss: f32,
    /// Whether a callback ended the run early
    pub stopped_early: bool,
    pub metrics: TrainMetrics,
}

impl TrainOutput {
    /// Write `train_results.json` into `dir`
    ///
    /// # Errors
    /// Returns error on serialization or write failure.
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        std::fs::write(dir.join(TRAIN_RESULTS_NAME), serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_writes_json() {
        let dir = tempfile::TempDir::new().unwrap();
        let output = TrainOutput {
            global_step: 3,
            training_loss: 1.5,
            stopped_early: false,
            metrics: TrainMetrics {
                train_runtime: 0.5,
                train_samples_per_second: 12.0,
                train_steps_per_second: 6.0,
                epoch: 1.0,
            },
        };
        output.save(dir.path()).unwrap();

        let json = std::fs::read_to_string(dir.path().join(TRAIN_RESULTS_NAME)).unwrap();
        let back: TrainOutput = serde_json::from_str(&json).unwrap();
        assert_eq!(back, output);
    }
}
