//! Tests for CLI argument parsing and overrides

use super::*;
use crate::config::FinetuneSpec;
use std::path::PathBuf;

#[test]
fn test_parse_finetune_defaults() {
    let cli = parse_args(["chatglm-finetune", "finetune"]).unwrap();
    match cli.command {
        Command::Finetune(args) => {
            assert!(args.config.is_none());
            assert!(args.dataset_path.is_none());
            assert!(!args.is_resume);
            assert!(!args.training.fp16);
        }
        _ => panic!("Expected Finetune command"),
    }
    assert!(!cli.verbose);
    assert!(!cli.quiet);
}

#[test]
fn test_parse_finetune_with_overrides() {
    let cli = parse_args([
        "chatglm-finetune",
        "finetune",
        "--dataset-path",
        "data/alpaca",
        "--model-path",
        "THUDM/chatglm-6b",
        "--lora-rank",
        "16",
        "--output-dir",
        "output",
        "--max-steps",
        "52000",
        "--save-steps",
        "1000",
        "--learning-rate",
        "2e-5",
        "--fp16",
    ])
    .unwrap();

    match cli.command {
        Command::Finetune(args) => {
            assert_eq!(args.dataset_path, Some(PathBuf::from("data/alpaca")));
            assert_eq!(args.lora_rank, Some(16));
            assert_eq!(args.training.output_dir, Some(PathBuf::from("output")));
            assert_eq!(args.training.max_steps, Some(52000));
            assert_eq!(args.training.save_steps, Some(1000));
            assert!((args.training.learning_rate.unwrap() - 2e-5).abs() < 1e-9);
            assert!(args.training.fp16);
        }
        _ => panic!("Expected Finetune command"),
    }
}

#[test]
fn test_parse_resume() {
    let cli = parse_args([
        "chatglm-finetune",
        "finetune",
        "--is-resume",
        "--resume-path",
        "output/alpaca_output/chatglm-lora.pt",
    ])
    .unwrap();

    match cli.command {
        Command::Finetune(args) => {
            assert!(args.is_resume);
            assert_eq!(
                args.resume_path,
                Some(PathBuf::from("output/alpaca_output/chatglm-lora.pt"))
            );
        }
        _ => panic!("Expected Finetune command"),
    }
}

#[test]
fn test_parse_local_rank_flag() {
    let cli = parse_args(["chatglm-finetune", "finetune", "--local-rank", "3"]).unwrap();
    match cli.command {
        Command::Finetune(args) => assert_eq!(args.local_rank, Some(3)),
        _ => panic!("Expected Finetune command"),
    }
}

#[test]
fn test_parse_local_rank_invalid() {
    let result = parse_args(["chatglm-finetune", "finetune", "--local-rank", "gpu0"]);
    assert!(result.is_err());
}

#[test]
fn test_parse_inspect() {
    let cli = parse_args(["chatglm-finetune", "inspect", "data/alpaca", "--head", "2"]).unwrap();
    match cli.command {
        Command::Inspect(args) => {
            assert_eq!(args.dataset, PathBuf::from("data/alpaca"));
            assert_eq!(args.head, 2);
        }
        _ => panic!("Expected Inspect command"),
    }
}

#[test]
fn test_inspect_requires_dataset() {
    assert!(parse_args(["chatglm-finetune", "inspect"]).is_err());
}

#[test]
fn test_global_flags() {
    let cli = parse_args(["chatglm-finetune", "finetune", "--verbose"]).unwrap();
    assert!(cli.verbose);
    let cli = parse_args(["chatglm-finetune", "-q", "inspect", "data"]).unwrap();
    assert!(cli.quiet);
}

#[test]
fn test_unknown_command() {
    assert!(parse_args(["chatglm-finetune", "train"]).is_err());
}

#[test]
fn test_apply_overrides_keeps_unset_fields() {
    let mut spec = FinetuneSpec::default();
    spec.training.learning_rate = 1e-4;
    spec.training.save_total_limit = Some(3);

    let args = FinetuneArgs {
        lora_rank: Some(4),
        training: TrainingOverrides {
            per_device_train_batch_size: Some(2),
            max_steps: Some(10),
            ..Default::default()
        },
        ..Default::default()
    };
    apply_overrides(&mut spec, &args);

    assert_eq!(spec.finetune.lora_rank, 4);
    assert_eq!(spec.training.per_device_train_batch_size, 2);
    assert_eq!(spec.training.max_steps, Some(10));
    assert!((spec.training.learning_rate - 1e-4).abs() < 1e-9);
    assert_eq!(spec.training.save_total_limit, Some(3));
    assert_eq!(spec.finetune.model_path, PathBuf::from("THUDM/chatglm-6b"));
}

#[test]
fn test_apply_overrides_flags() {
    let mut spec = FinetuneSpec::default();
    let cli = parse_args([
        "chatglm-finetune",
        "finetune",
        "--is-resume",
        "--fp16",
        "--remove-unused-columns",
        "true",
        "--seed",
        "7",
    ])
    .unwrap();
    let Command::Finetune(args) = cli.command else {
        panic!("Expected Finetune command");
    };
    apply_overrides(&mut spec, &args);

    assert!(spec.finetune.is_resume);
    assert!(spec.training.fp16);
    assert!(spec.training.remove_unused_columns);
    assert_eq!(spec.training.seed, 7);
}
