//! Validation error types

/// Validation error type
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Model path does not exist: {0}")]
    ModelPathNotFound(String),

    #[error("Dataset path does not exist: {0}")]
    DatasetNotFound(String),

    #[error("Resume path does not exist: {0}")]
    ResumePathNotFound(String),

    #[error("Invalid learning rate: {0} (must be > 0.0 and <= 1.0)")]
    InvalidLearningRate(f32),

    #[error("Invalid batch size: {0} (must be > 0)")]
    InvalidBatchSize(usize),

    #[error("Invalid epochs: {0} (must be > 0 unless max_steps is set)")]
    InvalidEpochs(usize),

    #[error("Invalid max steps: {0} (must be > 0)")]
    InvalidMaxSteps(usize),

    #[error("Invalid gradient accumulation steps: {0} (must be > 0)")]
    InvalidGradientAccumulation(usize),

    #[error("Invalid LoRA rank: {0} (must be > 0 and <= 1024)")]
    InvalidLoRARank(usize),

    #[error("Invalid weight decay: {0} (must be >= 0.0)")]
    InvalidWeightDecay(f32),

    #[error("Invalid Adam beta: {0} (must be in [0.0, 1.0))")]
    InvalidAdamBeta(f32),

    #[error("Invalid Adam epsilon: {0} (must be > 0.0)")]
    InvalidAdamEpsilon(f32),

    #[error("Invalid gradient clip value: {0} (must be >= 0.0)")]
    InvalidGradClip(f32),

    #[error("Invalid logging steps: {0} (must be > 0)")]
    InvalidLoggingSteps(usize),

    #[error("Invalid save steps: {0} (must be > 0)")]
    InvalidSaveSteps(usize),

    #[error("Invalid save total limit: {0} (must be > 0)")]
    InvalidSaveTotalLimit(usize),

    #[error("remove_unused_columns must be false: the collator needs the seq_len column")]
    RemoveUnusedColumns,
}
