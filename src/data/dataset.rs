//! In-memory training dataset

use std::path::Path;

use serde::Serialize;

use super::{load_jsonl, Example};
use crate::error::{Error, Result};

/// Pre-tokenized training examples
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    examples: Vec<Example>,
}

/// Length statistics of a dataset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetStats {
    /// Number of examples
    pub total: usize,
    /// Shortest example (tokens)
    pub min_len: usize,
    /// Longest example (tokens)
    pub max_len: usize,
    /// Mean example length (tokens)
    pub mean_len: f64,
    /// Mean prompt length (`seq_len - 1`)
    pub mean_prompt_len: f64,
    /// Total response tokens the loss sees (eos included)
    pub target_tokens: usize,
}

impl Dataset {
    /// Wrap a list of examples
    #[must_use]
    pub fn from_examples(examples: Vec<Example>) -> Self {
        Self { examples }
    }

    /// Number of examples
    #[must_use]
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    /// Whether the dataset is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// Example at `index`
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Example> {
        self.examples.get(index)
    }

    /// All examples
    #[must_use]
    pub fn examples(&self) -> &[Example] {
        &self.examples
    }

    /// Check every example can be collated.
    ///
    /// # Errors
    /// Reports the first example whose `seq_len` is below 2 or past its end.
    pub fn validate(&self) -> Result<()> {
        for (i, example) in self.examples.iter().enumerate() {
            if example.seq_len < 2 {
                return Err(Error::InvalidExample(format!(
                    "record {i}: seq_len must be >= 2, got {}",
                    example.seq_len
                )));
            }
            if example.seq_len - 1 > example.len() {
                return Err(Error::InvalidExample(format!(
                    "record {i}: seq_len {} points past {} input ids",
                    example.seq_len,
                    example.len()
                )));
            }
        }
        Ok(())
    }

    /// Length statistics, `None` when empty
    #[must_use]
    pub fn stats(&self) -> Option<DatasetStats> {
        let total = self.examples.len();
        if total == 0 {
            return None;
        }
        let lens = self.examples.iter().map(Example::len);
        let min_len = lens.clone().min().unwrap_or(0);
        let max_len = lens.clone().max().unwrap_or(0);
        let sum_len: usize = lens.sum();
        let sum_prompt: usize = self.examples.iter().map(|e| e.seq_len.saturating_sub(1)).sum();
        let target_tokens = self.examples.iter().map(|e| e.response_len() + 1).sum();

        Some(DatasetStats {
            total,
            min_len,
            max_len,
            mean_len: sum_len as f64 / total as f64,
            mean_prompt_len: sum_prompt as f64 / total as f64,
            target_tokens,
        })
    }
}

impl From<Vec<Example>> for Dataset {
    fn from(examples: Vec<Example>) -> Self {
        Self::from_examples(examples)
    }
}

/// Load a pre-tokenized dataset.
///
/// Accepts a `save_to_disk` directory (Arrow) or a `.jsonl` / `.json` file.
///
/// # Errors
/// Returns error if the path does not exist or the format is unsupported.
pub fn load_from_disk(path: &Path) -> Result<Dataset> {
    if path.is_dir() {
        return load_dir(path);
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some("jsonl" | "json") => {
            let examples = load_jsonl(path)?;
            tracing::info!(path = %path.display(), records = examples.len(), "loaded JSONL dataset");
            Ok(Dataset::from_examples(examples))
        }
        _ if !path.exists() => {
            Err(Error::Dataset(format!("Dataset path does not exist: {}", path.display())))
        }
        _ => Err(Error::Dataset(format!(
            "Unsupported dataset format: {} (expected a save_to_disk directory or .jsonl file)",
            path.display()
        ))),
    }
}

#[cfg(feature = "arrow")]
fn load_dir(path: &Path) -> Result<Dataset> {
    let examples = super::disk::load_arrow_dataset(path)?;
    tracing::info!(path = %path.display(), records = examples.len(), "loaded Arrow dataset");
    Ok(Dataset::from_examples(examples))
}

#[cfg(not(feature = "arrow"))]
fn load_dir(path: &Path) -> Result<Dataset> {
    Err(Error::Dataset(format!(
        "{} is a save_to_disk directory but this build has no `arrow` feature",
        path.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn dataset() -> Dataset {
        Dataset::from_examples(vec![
            Example::new(vec![1, 2, 3, 4], 2),
            Example::new(vec![1, 2, 3, 4, 5, 6, 7], 3),
        ])
    }

    #[test]
    fn test_stats() {
        let stats = dataset().stats().unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.min_len, 4);
        assert_eq!(stats.max_len, 7);
        assert_relative_eq!(stats.mean_len, 5.5);
        assert_relative_eq!(stats.mean_prompt_len, 1.5);
        // (3 + 1) + (5 + 1)
        assert_eq!(stats.target_tokens, 10);
    }

    #[test]
    fn test_empty_stats() {
        assert!(Dataset::default().stats().is_none());
        assert!(Dataset::default().is_empty());
    }

    #[test]
    fn test_validate() {
        assert!(dataset().validate().is_ok());
        let bad = Dataset::from(vec![Example::new(vec![1, 2], 1)]);
        assert!(matches!(bad.validate(), Err(Error::InvalidExample(_))));
        let past = Dataset::from(vec![Example::new(vec![1, 2], 5)]);
        assert!(past.validate().is_err());
    }

    #[test]
    fn test_load_jsonl_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.jsonl");
        super::super::save_jsonl(&path, dataset().examples()).unwrap();
        let loaded = load_from_disk(&path).unwrap();
        assert_eq!(loaded, dataset());
    }

    #[test]
    fn test_missing_path() {
        let err = load_from_disk(Path::new("/nonexistent/alpaca")).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        let err = load_from_disk(file.path()).unwrap_err();
        assert!(err.to_string().contains("Unsupported"));
    }

    #[cfg(feature = "arrow")]
    #[test]
    fn test_load_arrow_directory() {
        let dir = tempfile::tempdir().unwrap();
        super::super::save_arrow_dataset(dir.path(), dataset().examples()).unwrap();
        assert_eq!(load_from_disk(dir.path()).unwrap(), dataset());
    }
}
