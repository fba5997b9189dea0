//! Inspect command implementation

use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::InspectArgs;
use crate::data::{load_from_disk, Dataset};

pub fn run_inspect(args: &InspectArgs, level: LogLevel) -> Result<(), String> {
    let dataset = load_from_disk(&args.dataset).map_err(|e| format!("Failed to load dataset: {e}"))?;
    for line in describe(&dataset, args.head) {
        log(level, LogLevel::Normal, &line);
    }
    dataset.validate().map_err(|e| format!("Dataset is not trainable: {e}"))
}

/// Human-readable summary lines for a dataset
fn describe(dataset: &Dataset, head: usize) -> Vec<String> {
    let Some(stats) = dataset.stats() else {
        return vec!["Dataset is empty".to_string()];
    };

    let mut lines = vec![
        "Dataset Information:".to_string(),
        format!("  Examples: {}", stats.total),
        format!("  Length: min {} / max {} / mean {:.1}", stats.min_len, stats.max_len, stats.mean_len),
        format!("  Mean prompt length: {:.1}", stats.mean_prompt_len),
        format!("  Target tokens: {}", stats.target_tokens),
        format!("  Padded batch length (longest + 1): {}", stats.max_len + 1),
    ];
    for (i, example) in dataset.examples().iter().take(head).enumerate() {
        lines.push(format!(
            "  [{i}] seq_len={} input_ids={:?}",
            example.seq_len, example.input_ids
        ));
    }
    lines
}
