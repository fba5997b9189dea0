//! Learning rate schedule: linear warmup followed by linear decay to zero

use super::Optimizer;

/// Learning rate scheduler trait
pub trait LRScheduler {
    /// Get the current learning rate
    fn get_lr(&self) -> f32;

    /// Advance by one optimizer step
    fn step(&mut self);
}

/// Linear warmup from 0 to `lr_target` over `warmup_steps`, then linear
/// decay to 0 at `total_steps`.
///
/// lr_t = lr_target * t / warmup                       (t < warmup)
/// lr_t = lr_target * (total - t) / (total - warmup)   (otherwise, floored at 0)
#[derive(Debug, Clone)]
pub struct LinearScheduleLR {
    lr_target: f32,
    warmup_steps: usize,
    total_steps: usize,
    current_step: usize,
}

impl LinearScheduleLR {
    /// Create a scheduler
    pub fn new(lr_target: f32, warmup_steps: usize, total_steps: usize) -> Self {
        Self { lr_target, warmup_steps, total_steps, current_step: 0 }
    }

    /// Steps taken so far
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Apply the current learning rate to an optimizer
    pub fn apply<O: Optimizer + ?Sized>(&self, optimizer: &mut O) {
        optimizer.set_lr(self.get_lr());
    }
}

impl LRScheduler for LinearScheduleLR {
    fn get_lr(&self) -> f32 {
        let step = self.current_step;
        if step < self.warmup_steps {
            return self.lr_target * step as f32 / self.warmup_steps.max(1) as f32;
        }
        let decay_steps = self.total_steps.saturating_sub(self.warmup_steps).max(1);
        let remaining = self.total_steps.saturating_sub(step);
        self.lr_target * remaining as f32 / decay_steps as f32
    }

    fn step(&mut self) {
        self.current_step += 1;
    }
}
