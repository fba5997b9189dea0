//! Callback manager for dispatching events to multiple callbacks

use std::path::Path;

use super::traits::{CallbackAction, CallbackContext, TrainerCallback};

/// Manages multiple callbacks and dispatches events
#[derive(Default)]
pub struct CallbackManager {
    callbacks: Vec<Box<dyn TrainerCallback>>,
}

impl CallbackManager {
    /// Create new callback manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a callback
    pub fn add<C: TrainerCallback + 'static>(&mut self, callback: C) {
        self.callbacks.push(Box::new(callback));
    }

    /// Check if no callbacks are registered
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Get number of callbacks
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    /// Names of the registered callbacks
    pub fn names(&self) -> Vec<&'static str> {
        self.callbacks.iter().map(|cb| cb.name()).collect()
    }

    /// Fire train begin event
    pub fn on_train_begin(&mut self, ctx: &CallbackContext) -> CallbackAction {
        self.dispatch(|cb| cb.on_train_begin(ctx))
    }

    /// Fire train end event
    pub fn on_train_end(&mut self, ctx: &CallbackContext) {
        for cb in &mut self.callbacks {
            cb.on_train_end(ctx);
        }
    }

    /// Fire epoch begin event
    pub fn on_epoch_begin(&mut self, ctx: &CallbackContext) -> CallbackAction {
        self.dispatch(|cb| cb.on_epoch_begin(ctx))
    }

    /// Fire epoch end event
    pub fn on_epoch_end(&mut self, ctx: &CallbackContext) -> CallbackAction {
        self.dispatch(|cb| cb.on_epoch_end(ctx))
    }

    /// Fire step end event
    pub fn on_step_end(&mut self, ctx: &CallbackContext) -> CallbackAction {
        self.dispatch(|cb| cb.on_step_end(ctx))
    }

    /// Fire save event
    pub fn on_save(&mut self, ctx: &CallbackContext, checkpoint_dir: &Path) {
        for cb in &mut self.callbacks {
            cb.on_save(ctx, checkpoint_dir);
        }
    }

    /// Every callback sees the event; any `Stop` wins
    fn dispatch<F>(&mut self, mut event: F) -> CallbackAction
    where
        F: FnMut(&mut dyn TrainerCallback) -> CallbackAction,
    {
        let mut action = CallbackAction::Continue;
        for cb in &mut self.callbacks {
            if event(cb.as_mut()) == CallbackAction::Stop {
                action = CallbackAction::Stop;
            }
        }
        action
    }
}

impl std::fmt::Debug for CallbackManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackManager").field("callbacks", &self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StopAt {
        step: usize,
        seen: usize,
    }

    impl TrainerCallback for StopAt {
        fn on_step_end(&mut self, ctx: &CallbackContext) -> CallbackAction {
            self.seen += 1;
            if ctx.global_step >= self.step {
                CallbackAction::Stop
            } else {
                CallbackAction::Continue
            }
        }

        fn name(&self) -> &'static str {
            "StopAt"
        }
    }

    #[test]
    fn test_empty_manager_continues() {
        let mut manager = CallbackManager::new();
        assert!(manager.is_empty());
        assert_eq!(manager.on_step_end(&CallbackContext::default()), CallbackAction::Continue);
    }

    #[test]
    fn test_stop_propagates() {
        let mut manager = CallbackManager::new();
        manager.add(StopAt { step: 2, seen: 0 });
        manager.add(StopAt { step: 100, seen: 0 });
        assert_eq!(manager.len(), 2);
        assert_eq!(manager.names(), vec!["StopAt", "StopAt"]);

        let ctx = CallbackContext { global_step: 1, ..Default::default() };
        assert_eq!(manager.on_step_end(&ctx), CallbackAction::Continue);
        let ctx = CallbackContext { global_step: 2, ..Default::default() };
        assert_eq!(manager.on_step_end(&ctx), CallbackAction::Stop);
    }
}
