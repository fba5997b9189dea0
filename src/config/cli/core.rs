//! Core CLI types - Cli, Command and argument structs

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::schema::FinetuneSpec;
use crate::model::{parse_local_rank, LOCAL_RANK_ENV};

/// LoRA fine-tuning of ChatGLM causal language models
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "chatglm-finetune")]
#[command(version)]
#[command(about = "LoRA fine-tuning of ChatGLM with GLM attention masks and 2D position ids")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Fine-tune a model with LoRA adapters
    Finetune(FinetuneArgs),

    /// Print record count and length statistics of a tokenized dataset
    Inspect(InspectArgs),
}

/// Arguments for the finetune command
///
/// Every option left unset keeps the value from `--config` (or the built-in
/// default when no config file is given).
#[derive(Args, Debug, Clone, PartialEq, Default)]
pub struct FinetuneArgs {
    /// YAML file with `finetune` and `training` sections
    #[arg(long, value_name = "YAML")]
    pub config: Option<PathBuf>,

    /// Tokenized dataset directory or JSONL file [default: data/alpaca]
    #[arg(long)]
    pub dataset_path: Option<PathBuf>,

    /// Pretrained model directory [default: THUDM/chatglm-6b]
    #[arg(long)]
    pub model_path: Option<PathBuf>,

    /// LoRA rank [default: 8]
    #[arg(long)]
    pub lora_rank: Option<usize>,

    /// Resume adapter weights from --resume-path
    #[arg(long)]
    pub is_resume: bool,

    /// Saved adapter to resume from [default: output/alpaca_output]
    #[arg(long)]
    pub resume_path: Option<PathBuf>,

    #[command(flatten)]
    pub training: TrainingOverrides,

    /// Process-local device index
    #[arg(long, env = LOCAL_RANK_ENV, value_parser = local_rank_parser)]
    pub local_rank: Option<usize>,
}

/// Training options settable from the command line
#[derive(Args, Debug, Clone, PartialEq, Default)]
pub struct TrainingOverrides {
    /// Output directory for checkpoints and the adapter
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    #[arg(long)]
    pub num_train_epochs: Option<usize>,

    #[arg(long)]
    pub per_device_train_batch_size: Option<usize>,

    #[arg(long)]
    pub gradient_accumulation_steps: Option<usize>,

    #[arg(long)]
    pub learning_rate: Option<f32>,

    #[arg(long)]
    pub weight_decay: Option<f32>,

    #[arg(long)]
    pub adam_beta1: Option<f32>,

    #[arg(long)]
    pub adam_beta2: Option<f32>,

    #[arg(long)]
    pub adam_epsilon: Option<f32>,

    #[arg(long)]
    pub max_grad_norm: Option<f32>,

    /// Total optimizer steps (overrides epochs)
    #[arg(long)]
    pub max_steps: Option<usize>,

    #[arg(long)]
    pub warmup_steps: Option<usize>,

    #[arg(long)]
    pub logging_steps: Option<usize>,

    #[arg(long)]
    pub save_steps: Option<usize>,

    #[arg(long)]
    pub save_total_limit: Option<usize>,

    /// Random seed for shuffling, dropout and adapter init
    #[arg(long)]
    pub seed: Option<u64>,

    /// Compute the output head in half precision
    #[arg(long)]
    pub fp16: bool,

    #[arg(long)]
    pub remove_unused_columns: Option<bool>,
}

/// Arguments for the inspect command
#[derive(Args, Debug, Clone, PartialEq)]
pub struct InspectArgs {
    /// Dataset directory or JSONL file
    #[arg(value_name = "DATASET")]
    pub dataset: PathBuf,

    /// Also print the first N records
    #[arg(long, default_value_t = 0)]
    pub head: usize,
}

fn local_rank_parser(value: &str) -> Result<usize, String> {
    parse_local_rank(Some(value))
        .ok_or_else(|| format!("{LOCAL_RANK_ENV} must be a non-negative integer, got {value:?}"))
}

/// Parse CLI arguments from a string slice (for testing)
pub fn parse_args<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args)
}

/// Apply command-line overrides to a run configuration
pub fn apply_overrides(spec: &mut FinetuneSpec, args: &FinetuneArgs) {
    let finetune = &mut spec.finetune;
    if let Some(path) = &args.dataset_path {
        finetune.dataset_path = path.clone();
    }
    if let Some(path) = &args.model_path {
        finetune.model_path = path.clone();
    }
    if let Some(rank) = args.lora_rank {
        finetune.lora_rank = rank;
    }
    if args.is_resume {
        finetune.is_resume = true;
    }
    if let Some(path) = &args.resume_path {
        finetune.resume_path = path.clone();
    }

    let cli = &args.training;
    let training = &mut spec.training;
    if let Some(dir) = &cli.output_dir {
        training.output_dir = dir.clone();
    }
    macro_rules! override_fields {
        ($($field:ident),* $(,)?) => {
            $(if let Some(value) = cli.$field {
                training.$field = value;
            })*
        };
    }
    override_fields!(
        num_train_epochs,
        per_device_train_batch_size,
        gradient_accumulation_steps,
        learning_rate,
        weight_decay,
        adam_beta1,
        adam_beta2,
        adam_epsilon,
        max_grad_norm,
        warmup_steps,
        logging_steps,
        save_steps,
        seed,
        remove_unused_columns,
    );
    if cli.max_steps.is_some() {
        training.max_steps = cli.max_steps;
    }
    if cli.save_total_limit.is_some() {
        training.save_total_limit = cli.save_total_limit;
    }
    if cli.fp16 {
        training.fp16 = true;
    }
}
