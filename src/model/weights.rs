//! SafeTensors weight I/O
//!
//! Weights are held as f32 in memory; F16 and BF16 files are widened on load.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use ndarray::{ArrayD, IxDyn};
use safetensors::tensor::{Dtype, TensorView};
use safetensors::SafeTensors;

use crate::error::{Error, Result};

/// Named f32 tensors
pub type StateDict = BTreeMap<String, ArrayD<f32>>;

/// Convert a SafeTensors view to an f32 array
///
/// # Errors
/// Returns error for dtypes other than F32, F16 and BF16.
pub fn tensor_to_array(name: &str, tensor: &TensorView<'_>) -> Result<ArrayD<f32>> {
    let data = tensor.data();
    let values: Vec<f32> = match tensor.dtype() {
        Dtype::F32 => data
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
        Dtype::F16 => data
            .chunks_exact(2)
            .map(|c| half::f16::from_bits(u16::from_le_bytes([c[0], c[1]])).to_f32())
            .collect(),
        Dtype::BF16 => data
            .chunks_exact(2)
            .map(|c| half::bf16::from_bits(u16::from_le_bytes([c[0], c[1]])).to_f32())
            .collect(),
        other => {
            return Err(Error::SafeTensors(format!("{name}: unsupported dtype {other:?}")));
        }
    };
    ArrayD::from_shape_vec(IxDyn(tensor.shape()), values)
        .map_err(|e| Error::SafeTensors(format!("{name}: {e}")))
}

/// Read every tensor of a SafeTensors file
///
/// # Errors
/// Returns error if the file cannot be read or decoded.
pub fn read_safetensors(path: &Path) -> Result<StateDict> {
    let bytes = std::fs::read(path)
        .map_err(|e| Error::SafeTensors(format!("Failed to read {}: {e}", path.display())))?;
    let tensors = SafeTensors::deserialize(&bytes)
        .map_err(|e| Error::SafeTensors(format!("Failed to parse {}: {e}", path.display())))?;

    let mut out = StateDict::new();
    for (name, view) in tensors.tensors() {
        let array = tensor_to_array(&name, &view)?;
        out.insert(name, array);
    }
    Ok(out)
}

/// Write f32 tensors to a SafeTensors file with `format = pt` metadata
///
/// # Errors
/// Returns error on serialization or write failure.
pub fn write_safetensors(path: &Path, tensors: &StateDict) -> Result<()> {
    let buffers: Vec<(&str, Vec<usize>, Vec<f32>)> = tensors
        .iter()
        .map(|(name, array)| {
            (name.as_str(), array.shape().to_vec(), array.iter().copied().collect())
        })
        .collect();

    let mut views = Vec::with_capacity(buffers.len());
    for (name, shape, values) in &buffers {
        let bytes: &[u8] = bytemuck::cast_slice(values.as_slice());
        let view = TensorView::new(Dtype::F32, shape.clone(), bytes)?;
        views.push((*name, view));
    }

    let mut metadata = HashMap::new();
    metadata.insert("format".to_string(), "pt".to_string());

    let bytes = safetensors::serialize(views, &Some(metadata))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    Ok(())
}

/// SafeTensors files in a model directory, sorted by name (sharded checkpoints
/// load in shard order)
///
/// # Errors
/// Returns error if the directory cannot be listed.
pub fn find_safetensors_files(model_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(model_dir)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "safetensors"))
        .collect();
    files.sort();
    Ok(files)
}

/// Load all weights of a model directory
///
/// # Errors
/// Returns error when no SafeTensors file exists or one fails to decode.
pub fn load_model_weights(model_dir: &Path) -> Result<StateDict> {
    let files = find_safetensors_files(model_dir)?;
    if files.is_empty() {
        return Err(Error::Model(format!("No SafeTensors files found in {}", model_dir.display())));
    }

    let mut weights = StateDict::new();
    for file in &files {
        weights.extend(read_safetensors(file)?);
    }
    tracing::debug!(files = files.len(), tensors = weights.len(), "loaded model weights");
    Ok(weights)
}
