//! The training loop

use std::time::Instant;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::core::Trainer;
use super::result::{TrainMetrics, TrainOutput};
use crate::data::Example;
use crate::error::{Error, Result};
use crate::model::CausalLm;
use crate::optim::{LRScheduler, LinearScheduleLR};
use crate::train::callback::{CallbackAction, CallbackContext};
use crate::train::{LogEntry, TrainerState};

impl<M: CausalLm> Trainer<M> {
    /// Run training to completion
    ///
    /// Stops after `max_steps` optimizer steps (or `num_train_epochs` full
    /// epochs), or when a callback asks to stop. Every `logging_steps` steps
    /// the mean loss is logged; every `save_steps` steps a
    /// `checkpoint-{step}` directory is written.
    ///
    /// # Errors
    /// Returns [`Error::Dataset`] for an empty dataset, and propagates
    /// collation, forward/backward and checkpoint errors.
    pub fn train(&mut self) -> Result<TrainOutput> {
        let start = Instant::now();
        let batches_per_epoch = self.batches_per_epoch();
        if batches_per_epoch == 0 {
            return Err(Error::Dataset("training dataset is empty".into()));
        }
        let (max_steps, num_epochs) = self.plan();
        let accum = self.args.gradient_accumulation_steps;
        let batch_size = self.args.per_device_train_batch_size;

        let mut scheduler =
            LinearScheduleLR::new(self.args.learning_rate, self.args.warmup_steps, max_steps);
        scheduler.apply(self.optimizer.as_mut());

        let mut state = TrainerState::new(
            max_steps,
            num_epochs,
            batch_size,
            self.args.logging_steps,
            self.args.save_steps,
        );
        tracing::info!(
            examples = self.train_dataset.len(),
            num_epochs,
            batch_size,
            gradient_accumulation_steps = accum,
            max_steps,
            trainable = self.model.parameters().num_trainable(),
            "starting training"
        );

        let mut rng = StdRng::seed_from_u64(self.args.seed);
        self.model.set_training(true);
        self.model.parameters_mut().zero_grad();

        let mut total_loss = 0.0_f64;
        let mut interval_loss = 0.0_f64;
        let mut interval_steps = 0_usize;
        let mut last = CallbackContext { num_epochs, max_steps, ..Default::default() };
        last.lr = self.lr();

        let mut stopped_early = self.callbacks.on_train_begin(&last) == CallbackAction::Stop;

        for epoch in 0..num_epochs {
            if stopped_early || state.global_step >= max_steps {
                break;
            }
            last.epoch = epoch;
            if self.callbacks.on_epoch_begin(&last) == CallbackAction::Stop {
                stopped_early = true;
                break;
            }

            let mut order: Vec<usize> = (0..self.train_dataset.len()).collect();
            order.shuffle(&mut rng);

            let mut step_loss = 0.0_f32;
            for (index, chunk) in order.chunks(batch_size).enumerate() {
                let examples: Vec<&Example> =
                    chunk.iter().filter_map(|&i| self.train_dataset.get(i)).collect();
                let batch = self.data_collator.collate(&examples)?;
                step_loss += self.training_step(&batch)?;

                let is_boundary = (index + 1) % accum == 0 || index + 1 == batches_per_epoch;
                if !is_boundary {
                    continue;
                }

                let grad_norm = self.optimizer_step();
                scheduler.step();
                scheduler.apply(self.optimizer.as_mut());

                state.global_step += 1;
                state.epoch = epoch as f64 + (index + 1) as f64 / batches_per_epoch as f64;
                total_loss += f64::from(step_loss);
                interval_loss += f64::from(step_loss);
                interval_steps += 1;

                last.global_step = state.global_step;
                last.loss = step_loss;
                last.lr = self.lr();
                last.grad_norm = grad_norm;
                last.elapsed_secs = start.elapsed().as_secs_f64();
                step_loss = 0.0;

                if self.args.logging_steps > 0 && state.global_step % self.args.logging_steps == 0 {
                    let entry = LogEntry {
                        step: state.global_step,
                        epoch: state.epoch,
                        loss: (interval_loss / interval_steps as f64) as f32,
                        learning_rate: last.lr,
                        grad_norm,
                    };
                    tracing::info!(
                        step = entry.step,
                        epoch = format_args!("{:.2}", entry.epoch),
                        loss = entry.loss,
                        learning_rate = entry.learning_rate,
                        grad_norm = ?entry.grad_norm,
                        "train"
                    );
                    state.log(entry);
                    interval_loss = 0.0;
                    interval_steps = 0;
                }

                if self.args.save_steps > 0 && state.global_step % self.args.save_steps == 0 {
                    let dir = self.save_checkpoint(&mut state)?;
                    self.callbacks.on_save(&last, &dir);
                }

                if self.callbacks.on_step_end(&last) == CallbackAction::Stop {
                    stopped_early = true;
                }
                if stopped_early || state.global_step >= max_steps {
                    break;
                }
            }

            if self.callbacks.on_epoch_end(&last) == CallbackAction::Stop {
                stopped_early = true;
            }
        }

        last.elapsed_secs = start.elapsed().as_secs_f64();
        self.callbacks.on_train_end(&last);

        let runtime = last.elapsed_secs.max(f64::EPSILON);
        let training_loss = (total_loss / state.global_step.max(1) as f64) as f32;
        let samples = state.epoch * self.train_dataset.len() as f64;
        let output = TrainOutput {
            global_step: state.global_step,
            training_loss,
            stopped_early,
            metrics: TrainMetrics {
                train_runtime: last.elapsed_secs,
                train_samples_per_second: samples / runtime,
                train_steps_per_second: state.global_step as f64 / runtime,
                epoch: state.epoch,
            },
        };
        tracing::info!(
            global_step = output.global_step,
            training_loss = output.training_loss,
            train_runtime = output.metrics.train_runtime,
            "training finished"
        );
        self.state = Some(state);
        Ok(output)
    }
}
