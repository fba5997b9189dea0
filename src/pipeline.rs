//! End-to-end LoRA fine-tuning run
//!
//! ```text
//! FinetuneSpec -> validate -> LOCAL_RANK device -> load model (fp16 head)
//!   -> prepare_for_training -> get_peft_model -> [non-strict resume]
//!   -> load dataset -> Trainer::train -> <output_dir>/chatglm-lora.pt
//! ```

use std::path::{Path, PathBuf};

use crate::checkpoint::{load_adapter, LoadReport, ADAPTER_WEIGHTS_NAME};
use crate::collate::{DataCollator, MaskOptions};
use crate::config::{save_config, validate_config, validate_paths, FinetuneSpec};
use crate::data::load_from_disk;
use crate::error::Result;
use crate::lora::{get_peft_model, LoraConfig, PeftModel, TrainableSummary};
use crate::model::{
    load_pretrained, load_special_tokens, prepare_for_training, CausalLm, ComputeDevice,
    GlmForCausalLm, Precision,
};
use crate::train::{ProgressCallback, TrainOutput, Trainer};

/// Copy of the run configuration written into the output directory
pub const RUN_CONFIG_NAME: &str = "finetune_config.yaml";

/// What a finished run produced
#[derive(Debug, Clone)]
pub struct FinetuneOutcome {
    /// Device the run was placed on
    pub device: ComputeDevice,
    /// Trainable versus total parameter counts after adapter injection
    pub trainable: TrainableSummary,
    /// Outcome of the adapter resume, when one was requested
    pub resumed: Option<LoadReport>,
    pub train_output: TrainOutput,
    /// `<output_dir>/chatglm-lora.pt`
    pub adapter_path: PathBuf,
}

/// A saved adapter file, or the directory holding `chatglm-lora.pt`
#[must_use]
pub fn resolve_resume_path(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(ADAPTER_WEIGHTS_NAME)
    } else {
        path.to_path_buf()
    }
}

/// Load the base model and turn it into a trainable LoRA model
///
/// # Errors
/// Returns error when the model cannot be loaded, no layer matches the
/// adapter targets, or the resume file is unreadable or has mismatched
/// shapes.
pub fn build_model(
    spec: &FinetuneSpec,
    device: ComputeDevice,
) -> Result<(PeftModel<GlmForCausalLm>, Option<LoadReport>)> {
    let finetune = &spec.finetune;
    let training = &spec.training;

    let dtype = training.fp16.then_some(Precision::Fp16);
    let mut model = load_pretrained(&finetune.model_path, device, dtype)?;
    model.set_seed(training.seed);
    prepare_for_training(&mut model);

    let lora = LoraConfig::new(finetune.lora_rank);
    let mut model = get_peft_model(model, lora, training.seed)?;
    model.print_trainable_parameters();

    let resumed = if finetune.is_resume {
        let path = resolve_resume_path(&finetune.resume_path);
        Some(load_adapter(&mut model, &path)?)
    } else {
        None
    };
    Ok((model, resumed))
}

/// Run a complete fine-tuning job
///
/// # Errors
/// Returns error on invalid configuration, unreadable inputs, and any
/// training or write failure.
pub fn finetune(spec: &FinetuneSpec, local_rank: usize) -> Result<FinetuneOutcome> {
    validate_config(spec)?;
    validate_paths(spec)?;

    let device = ComputeDevice::from_local_rank(local_rank);
    tracing::info!(local_rank, %device, "selected device");

    let tokens = load_special_tokens(&spec.finetune.model_path)?;
    let (model, resumed) = build_model(spec, device)?;
    let trainable = TrainableSummary::of(&model);

    let dataset = load_from_disk(&spec.finetune.dataset_path)?;
    let collator = DataCollator::new(tokens.eos_token_id).with_mask_options(MaskOptions {
        gmask: false,
        position_encoding_2d: model.config().position_encoding_2d,
    });

    let output_dir = spec.training.output_dir.clone();
    std::fs::create_dir_all(&output_dir)?;
    save_config(spec, output_dir.join(RUN_CONFIG_NAME))?;

    let lora = model.peft_config().clone();
    let base_model = spec.finetune.model_path.display().to_string();
    let mut trainer = Trainer::new(model, spec.training.clone(), dataset, collator)?
        .with_adapter_config(lora, Some(base_model));
    trainer.add_callback(ProgressCallback::new());

    let train_output = trainer.train()?;
    train_output.save(&output_dir)?;
    let adapter_path = trainer.save_model(&output_dir)?;

    Ok(FinetuneOutcome { device, trainable, resumed, train_output, adapter_path })
}
