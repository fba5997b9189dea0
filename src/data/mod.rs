//! Pre-tokenized instruction datasets
//!
//! Records carry `input_ids` and `seq_len`. Two on-disk layouts are read:
//! HuggingFace `save_to_disk` directories (Arrow IPC streams, behind the
//! `arrow` feature) and JSONL files.

mod dataset;
#[cfg(feature = "arrow")]
mod disk;
mod example;
mod jsonl;

pub use dataset::{load_from_disk, Dataset, DatasetStats};
#[cfg(feature = "arrow")]
pub use disk::{load_arrow_dataset, save_arrow_dataset};
pub use example::Example;
pub use jsonl::{load_jsonl, save_jsonl};
