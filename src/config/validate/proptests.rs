//! Property tests for configuration validation

use super::validator::validate_config;
use crate::config::schema::FinetuneSpec;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_valid_ranges_accepted(
        rank in 1usize..=1024,
        batch in 1usize..256,
        accum in 1usize..64,
        lr in 1e-7f32..1.0,
        wd in 0.0f32..1.0,
    ) {
        let mut spec = FinetuneSpec::default();
        spec.finetune.lora_rank = rank;
        spec.training.per_device_train_batch_size = batch;
        spec.training.gradient_accumulation_steps = accum;
        spec.training.learning_rate = lr;
        spec.training.weight_decay = wd;
        prop_assert!(validate_config(&spec).is_ok());
    }

    #[test]
    fn prop_rank_above_limit_rejected(rank in 1025usize..100_000) {
        let mut spec = FinetuneSpec::default();
        spec.finetune.lora_rank = rank;
        prop_assert!(validate_config(&spec).is_err());
    }

    #[test]
    fn prop_non_positive_lr_rejected(lr in -1.0f32..=0.0) {
        let mut spec = FinetuneSpec::default();
        spec.training.learning_rate = lr;
        prop_assert!(validate_config(&spec).is_err());
    }
}
