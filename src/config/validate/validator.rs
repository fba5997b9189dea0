//! Configuration validation logic

use super::error::ValidationError;
use crate::checkpoint::ADAPTER_WEIGHTS_NAME;
use crate::config::schema::FinetuneSpec;

/// Validate numeric ranges and flags of a run configuration
pub fn validate_config(spec: &FinetuneSpec) -> Result<(), ValidationError> {
    let lora_rank = spec.finetune.lora_rank;
    if lora_rank == 0 || lora_rank > 1024 {
        return Err(ValidationError::InvalidLoRARank(lora_rank));
    }

    let training = &spec.training;
    if training.per_device_train_batch_size == 0 {
        return Err(ValidationError::InvalidBatchSize(training.per_device_train_batch_size));
    }
    if training.gradient_accumulation_steps == 0 {
        return Err(ValidationError::InvalidGradientAccumulation(
            training.gradient_accumulation_steps,
        ));
    }
    if training.learning_rate <= 0.0 || training.learning_rate > 1.0 {
        return Err(ValidationError::InvalidLearningRate(training.learning_rate));
    }
    if training.weight_decay < 0.0 {
        return Err(ValidationError::InvalidWeightDecay(training.weight_decay));
    }
    for beta in [training.adam_beta1, training.adam_beta2] {
        if !(0.0..1.0).contains(&beta) {
            return Err(ValidationError::InvalidAdamBeta(beta));
        }
    }
    if training.adam_epsilon <= 0.0 {
        return Err(ValidationError::InvalidAdamEpsilon(training.adam_epsilon));
    }
    if training.max_grad_norm < 0.0 {
        return Err(ValidationError::InvalidGradClip(training.max_grad_norm));
    }

    match training.max_steps {
        Some(0) => return Err(ValidationError::InvalidMaxSteps(0)),
        None if training.num_train_epochs == 0 => {
            return Err(ValidationError::InvalidEpochs(training.num_train_epochs));
        }
        _ => {}
    }

    if training.logging_steps == 0 {
        return Err(ValidationError::InvalidLoggingSteps(training.logging_steps));
    }
    if training.save_steps == 0 {
        return Err(ValidationError::InvalidSaveSteps(training.save_steps));
    }
    if training.save_total_limit == Some(0) {
        return Err(ValidationError::InvalidSaveTotalLimit(0));
    }
    if training.remove_unused_columns {
        return Err(ValidationError::RemoveUnusedColumns);
    }

    Ok(())
}

/// Check that the model, dataset and (when resuming) adapter paths exist
pub fn validate_paths(spec: &FinetuneSpec) -> Result<(), ValidationError> {
    let args = &spec.finetune;
    if !args.model_path.exists() {
        return Err(ValidationError::ModelPathNotFound(args.model_path.display().to_string()));
    }
    if !args.dataset_path.exists() {
        return Err(ValidationError::DatasetNotFound(args.dataset_path.display().to_string()));
    }
    if args.is_resume {
        let resume = &args.resume_path;
        let exists = if resume.is_dir() {
            resume.join(ADAPTER_WEIGHTS_NAME).exists()
        } else {
            resume.exists()
        };
        if !exists {
            return Err(ValidationError::ResumePathNotFound(resume.display().to_string()));
        }
    }
    Ok(())
}
