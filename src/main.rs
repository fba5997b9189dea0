//! chatglm-finetune CLI
//!
//! # Usage
//!
//! ```bash
//! # LoRA fine-tune with defaults (data/alpaca, THUDM/chatglm-6b, rank 8)
//! chatglm-finetune finetune --output-dir output --max-steps 52000 --save-steps 1000
//!
//! # Settings from YAML, flags override
//! chatglm-finetune finetune --config run.yaml --learning-rate 2e-5
//!
//! # Resume a saved adapter
//! chatglm-finetune finetune --is-resume --resume-path output/alpaca_output
//!
//! # Dataset statistics
//! chatglm-finetune inspect data/alpaca
//! ```

use chatglm_finetune::cli::{init_tracing, run_command, Cli, LogLevel};
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(LogLevel::from_flags(cli.quiet, cli.verbose));

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
