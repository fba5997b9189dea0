//! Unit tests for configuration validation

use super::error::ValidationError;
use super::validator::{validate_config, validate_paths};
use crate::checkpoint::ADAPTER_WEIGHTS_NAME;
use crate::config::schema::*;
use tempfile::TempDir;

fn create_valid_spec() -> FinetuneSpec {
    FinetuneSpec::default()
}

#[test]
fn test_valid_config() {
    assert!(validate_config(&create_valid_spec()).is_ok());
}

#[test]
fn test_invalid_lora_rank() {
    let mut spec = create_valid_spec();
    spec.finetune.lora_rank = 0;
    assert!(matches!(validate_config(&spec), Err(ValidationError::InvalidLoRARank(0))));

    spec.finetune.lora_rank = 2048;
    assert!(matches!(validate_config(&spec), Err(ValidationError::InvalidLoRARank(2048))));
}

#[test]
fn test_invalid_batch_size() {
    let mut spec = create_valid_spec();
    spec.training.per_device_train_batch_size = 0;
    let err = validate_config(&spec).unwrap_err();
    assert!(matches!(err, ValidationError::InvalidBatchSize(0)));
}

#[test]
fn test_invalid_gradient_accumulation() {
    let mut spec = create_valid_spec();
    spec.training.gradient_accumulation_steps = 0;
    assert!(matches!(
        validate_config(&spec),
        Err(ValidationError::InvalidGradientAccumulation(0))
    ));
}

#[test]
fn test_invalid_learning_rate() {
    let mut spec = create_valid_spec();
    spec.training.learning_rate = 0.0;
    let err = validate_config(&spec).unwrap_err();
    assert!(matches!(err, ValidationError::InvalidLearningRate(0.0)));

    spec.training.learning_rate = 1.5;
    assert!(matches!(validate_config(&spec), Err(ValidationError::InvalidLearningRate(_))));
}

#[test]
fn test_invalid_adam_params() {
    let mut spec = create_valid_spec();
    spec.training.adam_beta2 = 1.0;
    assert!(matches!(validate_config(&spec), Err(ValidationError::InvalidAdamBeta(_))));

    let mut spec = create_valid_spec();
    spec.training.adam_epsilon = 0.0;
    assert!(matches!(validate_config(&spec), Err(ValidationError::InvalidAdamEpsilon(_))));
}

#[test]
fn test_zero_grad_norm_disables_clipping() {
    let mut spec = create_valid_spec();
    spec.training.max_grad_norm = 0.0;
    assert!(validate_config(&spec).is_ok());

    spec.training.max_grad_norm = -1.0;
    assert!(matches!(validate_config(&spec), Err(ValidationError::InvalidGradClip(_))));
}

#[test]
fn test_epochs_and_max_steps() {
    let mut spec = create_valid_spec();
    spec.training.num_train_epochs = 0;
    assert!(matches!(validate_config(&spec), Err(ValidationError::InvalidEpochs(0))));

    spec.training.max_steps = Some(10);
    assert!(validate_config(&spec).is_ok());

    spec.training.max_steps = Some(0);
    assert!(matches!(validate_config(&spec), Err(ValidationError::InvalidMaxSteps(0))));
}

#[test]
fn test_invalid_intervals() {
    let mut spec = create_valid_spec();
    spec.training.logging_steps = 0;
    assert!(matches!(validate_config(&spec), Err(ValidationError::InvalidLoggingSteps(0))));

    let mut spec = create_valid_spec();
    spec.training.save_steps = 0;
    assert!(matches!(validate_config(&spec), Err(ValidationError::InvalidSaveSteps(0))));

    let mut spec = create_valid_spec();
    spec.training.save_total_limit = Some(0);
    assert!(matches!(validate_config(&spec), Err(ValidationError::InvalidSaveTotalLimit(0))));
}

#[test]
fn test_remove_unused_columns_rejected() {
    let mut spec = create_valid_spec();
    spec.training.remove_unused_columns = true;
    assert!(matches!(validate_config(&spec), Err(ValidationError::RemoveUnusedColumns)));
}

#[test]
fn test_error_messages() {
    let err = ValidationError::InvalidLoRARank(0);
    assert!(err.to_string().contains("LoRA rank"));
    let err = ValidationError::RemoveUnusedColumns;
    assert!(err.to_string().contains("seq_len"));
}

#[test]
fn test_paths_missing_model() {
    let spec = create_valid_spec();
    assert!(matches!(validate_paths(&spec), Err(ValidationError::ModelPathNotFound(_))));
}

#[test]
fn test_paths_existing() {
    let dir = TempDir::new().unwrap();
    let mut spec = create_valid_spec();
    spec.finetune.model_path = dir.path().to_path_buf();
    spec.finetune.dataset_path = dir.path().to_path_buf();
    assert!(validate_paths(&spec).is_ok());

    spec.finetune.is_resume = true;
    spec.finetune.resume_path = dir.path().to_path_buf();
    assert!(matches!(validate_paths(&spec), Err(ValidationError::ResumePathNotFound(_))));

    std::fs::write(dir.path().join(ADAPTER_WEIGHTS_NAME), b"").unwrap();
    assert!(validate_paths(&spec).is_ok());
}

#[test]
fn test_paths_missing_dataset() {
    let dir = TempDir::new().unwrap();
    let mut spec = create_valid_spec();
    spec.finetune.model_path = dir.path().to_path_buf();
    spec.finetune.dataset_path = dir.path().join("missing");
    assert!(matches!(validate_paths(&spec), Err(ValidationError::DatasetNotFound(_))));
}
