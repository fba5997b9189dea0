//! Core Trainer struct and basic methods

use std::path::{Path, PathBuf};

use crate::checkpoint::{save_adapter, save_tunable_parameters, ADAPTER_WEIGHTS_NAME};
use crate::collate::DataCollator;
use crate::config::TrainingArguments;
use crate::data::Dataset;
use crate::error::{Error, Result};
use crate::lora::LoraConfig;
use crate::model::CausalLm;
use crate::optim::{AdamW, Optimizer};
use crate::train::callback::{CallbackManager, TrainerCallback};
use crate::train::{ChatGlmLoss, ComputeLoss, TrainerState};

/// Single-process trainer for a causal language model
///
/// Shuffles the dataset every epoch, collates batches with the
/// [`DataCollator`], accumulates gradients over
/// `gradient_accumulation_steps` batches and applies AdamW with a linear
/// warmup/decay schedule.
///
/// # Example
///
/// ```no_run
/// use chatglm_finetune::collate::DataCollator;
/// use chatglm_finetune::config::TrainingArguments;
/// use chatglm_finetune::data::load_from_disk;
/// use chatglm_finetune::model::{CausalLm, GlmForCausalLm, ModelConfig};
/// use chatglm_finetune::train::Trainer;
/// # fn main() -> chatglm_finetune::Result<()> {
/// let model = GlmForCausalLm::init(ModelConfig::tiny(32, 8), 0)?;
/// let dataset = load_from_disk("data/alpaca".as_ref())?;
/// let collator = DataCollator::new(model.config().eos_token_id);
///
/// let mut trainer = Trainer::new(model, TrainingArguments::default(), dataset, collator)?;
/// let output = trainer.train()?;
/// println!("{} steps, loss {:.4}", output.global_step, output.training_loss);
/// # Ok(())
/// # }
/// ```
pub struct Trainer<M: CausalLm> {
    pub(crate) model: M,
    pub(crate) args: TrainingArguments,
    pub(crate) train_dataset: Dataset,
    pub(crate) data_collator: DataCollator,
    pub(crate) loss: Box<dyn ComputeLoss>,
    pub(crate) optimizer: Box<dyn Optimizer>,
    pub(crate) callbacks: CallbackManager,
    /// Written next to the weights of every checkpoint when set
    pub(crate) adapter_config: Option<(LoraConfig, Option<String>)>,
    pub(crate) state: Option<TrainerState>,
}

impl<M: CausalLm> Trainer<M> {
    /// Create a trainer with AdamW built from `args`
    ///
    /// # Errors
    /// Returns [`Error::ConfigError`] when the batch size or the number of
    /// accumulation steps is zero.
    pub fn new(
        model: M,
        args: TrainingArguments,
        train_dataset: Dataset,
        data_collator: DataCollator,
    ) -> Result<Self> {
        if args.per_device_train_batch_size == 0 {
            return Err(Error::ConfigError("per_device_train_batch_size must be > 0".into()));
        }
        if args.gradient_accumulation_steps == 0 {
            return Err(Error::ConfigError("gradient_accumulation_steps must be > 0".into()));
        }
        let optimizer = AdamW::new(
            args.learning_rate,
            args.adam_beta1,
            args.adam_beta2,
            args.adam_epsilon,
            args.weight_decay,
        );
        Ok(Self {
            model,
            args,
            train_dataset,
            data_collator,
            loss: Box::new(ChatGlmLoss),
            optimizer: Box::new(optimizer),
            callbacks: CallbackManager::new(),
            adapter_config: None,
            state: None,
        })
    }

    /// Replace the loss computation
    pub fn set_compute_loss(&mut self, loss: Box<dyn ComputeLoss>) {
        self.loss = loss;
    }

    /// Replace the optimizer
    pub fn set_optimizer(&mut self, optimizer: Box<dyn Optimizer>) {
        self.optimizer = optimizer;
    }

    /// Also write `adapter_config.json` whenever weights are saved
    #[must_use]
    pub fn with_adapter_config(mut self, config: LoraConfig, base_model: Option<String>) -> Self {
        self.adapter_config = Some((config, base_model));
        self
    }

    /// Add a callback to the trainer
    pub fn add_callback<C: TrainerCallback + 'static>(&mut self, callback: C) {
        self.callbacks.add(callback);
    }

    /// Get reference to callback manager
    pub fn callbacks(&self) -> &CallbackManager {
        &self.callbacks
    }

    /// Training arguments
    pub fn args(&self) -> &TrainingArguments {
        &self.args
    }

    /// The model being trained
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Mutable access to the model
    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    /// Give the trained model back
    pub fn into_model(self) -> M {
        self.model
    }

    /// Training dataset
    pub fn train_dataset(&self) -> &Dataset {
        &self.train_dataset
    }

    /// State of the last (or running) call to `train`
    pub fn state(&self) -> Option<&TrainerState> {
        self.state.as_ref()
    }

    /// Get current learning rate
    pub fn lr(&self) -> f32 {
        self.optimizer.lr()
    }

    /// Batches drawn from the dataset per epoch
    pub fn batches_per_epoch(&self) -> usize {
        self.train_dataset.len().div_ceil(self.args.per_device_train_batch_size)
    }

    /// Optimizer steps per epoch (a trailing partial accumulation window
    /// still counts as a step)
    pub fn update_steps_per_epoch(&self) -> usize {
        self.batches_per_epoch().div_ceil(self.args.gradient_accumulation_steps)
    }

    /// Total optimizer steps and epochs of a run: `max_steps` wins over
    /// `num_train_epochs` when set.
    pub fn plan(&self) -> (usize, usize) {
        let per_epoch = self.update_steps_per_epoch();
        match self.args.max_steps {
            Some(max_steps) if per_epoch > 0 => (max_steps, max_steps.div_ceil(per_epoch)),
            Some(max_steps) => (max_steps, 0),
            None => (self.args.num_train_epochs * per_epoch, self.args.num_train_epochs),
        }
    }

    /// Write the trainable parameters (and adapter config, when set) into
    /// `dir` as `chatglm-lora.pt`
    ///
    /// # Errors
    /// Returns error on write failure.
    pub fn save_model(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        match &self.adapter_config {
            Some((config, base_model)) => save_adapter(&self.model, config, base_model.as_deref(), dir),
            None => {
                let path = dir.join(ADAPTER_WEIGHTS_NAME);
                save_tunable_parameters(&self.model, &path)?;
                Ok(path)
            }
        }
    }
}

impl<M: CausalLm> std::fmt::Debug for Trainer<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trainer")
            .field("args", &self.args)
            .field("examples", &self.train_dataset.len())
            .field("loss", &self.loss.name())
            .field("callbacks", &self.callbacks)
            .finish_non_exhaustive()
    }
}
