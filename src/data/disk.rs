//! HuggingFace `save_to_disk` datasets
//!
//! A saved dataset directory holds `state.json` listing Arrow IPC stream files
//! under `_data_files`. A `DatasetDict` adds `dataset_dict.json` with one
//! sub-directory per split.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, Int64Array, ListArray, RecordBatch};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Int64Type, Schema};
use arrow::ipc::reader::StreamReader;
use arrow::ipc::writer::StreamWriter;
use serde::{Deserialize, Serialize};

use super::Example;
use crate::error::{Error, Result};

/// Split loaded from a `DatasetDict` when present
pub const DEFAULT_SPLIT: &str = "train";

#[derive(Debug, Serialize, Deserialize)]
struct DatasetState {
    #[serde(rename = "_data_files")]
    data_files: Vec<DataFile>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DataFile {
    filename: String,
}

#[derive(Debug, Deserialize)]
struct DatasetDict {
    splits: Vec<String>,
}

fn arrow_err(context: &str) -> impl Fn(arrow::error::ArrowError) -> Error + '_ {
    move |e| Error::Dataset(format!("{context}: {e}"))
}

/// Load a dataset directory written by `datasets.Dataset.save_to_disk`.
///
/// # Errors
/// Returns error if metadata is missing, a data file cannot be decoded, or a
/// record lacks `input_ids` / `seq_len`.
pub fn load_arrow_dataset(dir: &Path) -> Result<Vec<Example>> {
    let dict_path = dir.join("dataset_dict.json");
    if dict_path.exists() {
        let dict: DatasetDict = serde_json::from_str(&std::fs::read_to_string(&dict_path)?)?;
        let split = dict
            .splits
            .iter()
            .find(|s| s.as_str() == DEFAULT_SPLIT)
            .or_else(|| dict.splits.first())
            .ok_or_else(|| Error::Dataset(format!("{} lists no splits", dict_path.display())))?;
        tracing::debug!(split = %split, "loading split from dataset dict");
        return load_arrow_dataset(&dir.join(split));
    }

    let state_path = dir.join("state.json");
    let state: DatasetState = serde_json::from_str(
        &std::fs::read_to_string(&state_path).map_err(|e| {
            Error::Dataset(format!("Failed to read {}: {e}", state_path.display()))
        })?,
    )?;

    let mut examples = Vec::new();
    for data_file in &state.data_files {
        examples.extend(read_arrow_stream(&dir.join(&data_file.filename))?);
    }
    Ok(examples)
}

fn read_arrow_stream(path: &Path) -> Result<Vec<Example>> {
    let file = File::open(path)
        .map_err(|e| Error::Dataset(format!("Failed to open {}: {e}", path.display())))?;
    let reader = StreamReader::try_new(BufReader::new(file), None)
        .map_err(arrow_err("Invalid Arrow stream"))?;

    let mut examples = Vec::new();
    for batch in reader {
        let batch = batch.map_err(arrow_err("Failed to read record batch"))?;
        examples.extend(record_batch_to_examples(&batch)?);
    }
    Ok(examples)
}

fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .ok_or_else(|| Error::Dataset(format!("Dataset has no `{name}` column")))
}

fn list_of_i64() -> DataType {
    DataType::List(Arc::new(Field::new("item", DataType::Int64, true)))
}

fn record_batch_to_examples(batch: &RecordBatch) -> Result<Vec<Example>> {
    let ids = cast(column(batch, "input_ids")?, &list_of_i64())
        .map_err(arrow_err("`input_ids` must be a list of integers"))?;
    let ids = ids.as_list::<i32>();
    let seq = cast(column(batch, "seq_len")?, &DataType::Int64)
        .map_err(arrow_err("`seq_len` must be an integer"))?;
    let seq = seq.as_primitive::<Int64Type>();

    let mut examples = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        if ids.is_null(row) || seq.is_null(row) {
            return Err(Error::Dataset(format!("Null field in record {row}")));
        }
        let values = ids.value(row);
        let input_ids = values.as_primitive::<Int64Type>().values().to_vec();
        let seq_len = usize::try_from(seq.value(row)).map_err(|_| {
            Error::Dataset(format!("Negative seq_len {} in record {row}", seq.value(row)))
        })?;
        examples.push(Example { input_ids, seq_len });
    }
    Ok(examples)
}

/// Write examples in the `save_to_disk` layout (single data file).
///
/// # Errors
/// Returns error on I/O or Arrow encoding failure.
pub fn save_arrow_dataset(dir: &Path, examples: &[Example]) -> Result<()> {
    std::fs::create_dir_all(dir)?;

    let schema = Arc::new(Schema::new(vec![
        Field::new("input_ids", list_of_i64(), true),
        Field::new("seq_len", DataType::Int64, true),
    ]));
    let ids = ListArray::from_iter_primitive::<Int64Type, _, _>(
        examples.iter().map(|e| Some(e.input_ids.iter().copied().map(Some).collect::<Vec<_>>())),
    );
    let seq_lens = Int64Array::from_iter_values(examples.iter().map(|e| e.seq_len as i64));
    let batch = RecordBatch::try_new(schema.clone(), vec![Arc::new(ids), Arc::new(seq_lens)])
        .map_err(arrow_err("Failed to build record batch"))?;

    let filename = "data-00000-of-00001.arrow".to_string();
    let file = File::create(dir.join(&filename))?;
    let mut writer = StreamWriter::try_new(BufWriter::new(file), &schema)
        .map_err(arrow_err("Failed to open Arrow writer"))?;
    writer.write(&batch).map_err(arrow_err("Failed to write record batch"))?;
    writer.finish().map_err(arrow_err("Failed to finish Arrow stream"))?;

    let state = DatasetState { data_files: vec![DataFile { filename }] };
    std::fs::write(dir.join("state.json"), serde_json::to_string_pretty(&state)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> Vec<Example> {
        vec![Example::new(vec![5, 6, 7, 8], 2), Example::new(vec![1, 2, 3, 4, 5, 6, 7], 3)]
    }

    #[test]
    fn test_save_and_load_arrow_dataset() {
        let dir = TempDir::new().unwrap();
        save_arrow_dataset(dir.path(), &sample()).unwrap();
        assert!(dir.path().join("state.json").exists());

        let loaded = load_arrow_dataset(dir.path()).unwrap();
        assert_eq!(loaded, sample());
    }

    #[test]
    fn test_dataset_dict_prefers_train_split() {
        let dir = TempDir::new().unwrap();
        save_arrow_dataset(&dir.path().join("validation"), &[Example::new(vec![1], 2)]).unwrap();
        save_arrow_dataset(&dir.path().join("train"), &sample()).unwrap();
        std::fs::write(
            dir.path().join("dataset_dict.json"),
            r#"{"splits": ["validation", "train"]}"#,
        )
        .unwrap();

        let loaded = load_arrow_dataset(dir.path()).unwrap();
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn test_missing_state_json() {
        let dir = TempDir::new().unwrap();
        let err = load_arrow_dataset(dir.path()).unwrap_err();
        assert!(err.to_string().contains("state.json"));
    }

    #[test]
    fn test_missing_column() {
        let dir = TempDir::new().unwrap();
        let schema = Arc::new(Schema::new(vec![Field::new("seq_len", DataType::Int64, true)]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![Arc::new(Int64Array::from(vec![2i64]))],
        )
        .unwrap();
        let file = File::create(dir.path().join("data.arrow")).unwrap();
        let mut writer = StreamWriter::try_new(file, &schema).unwrap();
        writer.write(&batch).unwrap();
        writer.finish().unwrap();
        std::fs::write(
            dir.path().join("state.json"),
            r#"{"_data_files": [{"filename": "data.arrow"}]}"#,
        )
        .unwrap();

        let err = load_arrow_dataset(dir.path()).unwrap_err();
        assert!(err.to_string().contains("input_ids"));
    }
}
