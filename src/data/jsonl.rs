//! JSONL dataset loader
//!
//! One record per line: `{"input_ids": [..], "seq_len": n}`.

use std::path::Path;

use super::Example;
use crate::error::{Error, Result};

/// Load examples from a JSONL file.
///
/// Blank lines are skipped.
///
/// # Errors
/// Returns error if the file cannot be read or a line is not a valid record.
pub fn load_jsonl(path: &Path) -> Result<Vec<Example>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Dataset(format!("Failed to read dataset {}: {e}", path.display()))
    })?;

    let mut examples = Vec::new();
    for (line_num, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let example: Example = serde_json::from_str(line).map_err(|e| {
            Error::Dataset(format!("Invalid JSONL at line {}: {e}", line_num + 1))
        })?;
        examples.push(example);
    }

    Ok(examples)
}

/// Write examples as JSONL (used to export converted datasets and in tests).
///
/// # Errors
/// Returns error on serialization or write failure.
pub fn save_jsonl(path: &Path, examples: &[Example]) -> Result<()> {
    let mut out = String::new();
    for example in examples {
        out.push_str(&serde_json::to_string(example)?);
        out.push('\n');
    }
    std::fs::write(path, out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_jsonl_skips_blank_lines() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"input_ids": [5, 6, 7], "seq_len": 2}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"input_ids": [1, 2], "seq_len": 3}}"#).unwrap();

        let examples = load_jsonl(file.path()).unwrap();
        assert_eq!(examples.len(), 2);
        assert_eq!(examples[0], Example::new(vec![5, 6, 7], 2));
        assert_eq!(examples[1].seq_len, 3);
    }

    #[test]
    fn test_load_jsonl_reports_line() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"input_ids": [5], "seq_len": 2}}"#).unwrap();
        writeln!(file, r#"{{"input_ids": "oops"}}"#).unwrap();

        let err = load_jsonl(file.path()).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.jsonl");
        let examples = vec![Example::new(vec![1, 2, 3], 2), Example::new(vec![9], 2)];
        save_jsonl(&path, &examples).unwrap();
        assert_eq!(load_jsonl(&path).unwrap(), examples);
    }

    #[test]
    fn test_missing_file() {
        let result = load_jsonl(Path::new("/nonexistent/train.jsonl"));
        assert!(matches!(result, Err(Error::Dataset(_))));
    }
}
