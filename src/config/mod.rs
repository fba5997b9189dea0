//! Run configuration: schema, YAML loading, validation and CLI overrides

pub mod cli;
mod loader;
mod schema;
pub mod validate;

pub use cli::{apply_overrides, parse_args, Cli, Command, FinetuneArgs, InspectArgs, TrainingOverrides};
pub use loader::{load_config, save_config};
pub use schema::{FinetuneArguments, FinetuneSpec, TrainingArguments};
pub use validate::{validate_config, validate_paths, ValidationError};
