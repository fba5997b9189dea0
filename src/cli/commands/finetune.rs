//! Finetune command implementation

use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::{apply_overrides, load_config, FinetuneArgs, FinetuneSpec};
use crate::pipeline::finetune;

/// YAML config (or defaults) with the command-line flags applied on top
pub(crate) fn resolve_spec(args: &FinetuneArgs) -> Result<FinetuneSpec, String> {
    let mut spec = match &args.config {
        Some(path) => load_config(path).map_err(|e| e.to_string())?,
        None => FinetuneSpec::default(),
    };
    apply_overrides(&mut spec, args);
    Ok(spec)
}

pub fn run_finetune(args: &FinetuneArgs, level: LogLevel) -> Result<(), String> {
    let spec = resolve_spec(args)?;
    let local_rank = args.local_rank.unwrap_or(0);

    log(
        level,
        LogLevel::Verbose,
        &format!("Configuration:\n{}", serde_yaml::to_string(&spec).unwrap_or_default()),
    );

    let outcome = finetune(&spec, local_rank).map_err(|e| format!("Fine-tuning failed: {e}"))?;

    log(level, LogLevel::Normal, "Fine-tuning complete");
    log(level, LogLevel::Normal, &format!("  Device: {}", outcome.device));
    log(
        level,
        LogLevel::Normal,
        &format!(
            "  Trainable params: {} / {} ({:.4}%)",
            outcome.trainable.trainable,
            outcome.trainable.total,
            outcome.trainable.percent()
        ),
    );
    if let Some(report) = &outcome.resumed {
        log(
            level,
            LogLevel::Normal,
            &format!(
                "  Resumed: {} loaded, {} missing, {} unexpected",
                report.loaded.len(),
                report.missing.len(),
                report.unexpected.len()
            ),
        );
    }
    log(
        level,
        LogLevel::Normal,
        &format!(
            "  Steps: {}  loss: {:.4}  runtime: {:.1}s",
            outcome.train_output.global_step,
            outcome.train_output.training_loss,
            outcome.train_output.metrics.train_runtime
        ),
    );
    log(level, LogLevel::Normal, &format!("  Adapter: {}", outcome.adapter_path.display()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{save_config, TrainingOverrides};
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_defaults() {
        let spec = resolve_spec(&FinetuneArgs::default()).unwrap();
        assert_eq!(spec, FinetuneSpec::default());
    }

    #[test]
    fn test_cli_overrides_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.yaml");
        let mut file_spec = FinetuneSpec::default();
        file_spec.finetune.lora_rank = 16;
        file_spec.training.learning_rate = 1e-4;
        file_spec.training.save_steps = 1000;
        save_config(&file_spec, &path).unwrap();

        let args = FinetuneArgs {
            config: Some(path),
            lora_rank: Some(4),
            training: TrainingOverrides {
                output_dir: Some(PathBuf::from("out")),
                ..Default::default()
            },
            ..Default::default()
        };
        let spec = resolve_spec(&args).unwrap();

        assert_eq!(spec.finetune.lora_rank, 4);
        assert!((spec.training.learning_rate - 1e-4).abs() < 1e-9);
        assert_eq!(spec.training.save_steps, 1000);
        assert_eq!(spec.training.output_dir, PathBuf::from("out"));
    }

    #[test]
    fn test_missing_config_file() {
        let args = FinetuneArgs {
            config: Some(PathBuf::from("/nonexistent/run.yaml")),
            ..Default::default()
        };
        assert!(resolve_spec(&args).is_err());
    }

    #[test]
    fn test_invalid_spec_fails() {
        let args = FinetuneArgs {
            lora_rank: Some(0),
            ..Default::default()
        };
        let err = run_finetune(&args, LogLevel::Quiet).unwrap_err();
        assert!(err.contains("Fine-tuning failed"));
    }
}
