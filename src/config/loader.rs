//! YAML configuration loading

use std::path::Path;

use super::schema::FinetuneSpec;
use crate::error::{Error, Result};

/// Load a run configuration from a YAML file
///
/// # Errors
/// Returns [`Error::ConfigError`] if the file cannot be read or parsed.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<FinetuneSpec> {
    let path = path.as_ref();
    let yaml = std::fs::read_to_string(path).map_err(|e| {
        Error::ConfigError(format!("Failed to read config file {}: {e}", path.display()))
    })?;
    serde_yaml::from_str(&yaml)
        .map_err(|e| Error::ConfigError(format!("Failed to parse YAML config: {e}")))
}

/// Write a run configuration as YAML
///
/// # Errors
/// Returns error on serialization or write failure.
pub fn save_config<P: AsRef<Path>>(spec: &FinetuneSpec, path: P) -> Result<()> {
    let yaml = serde_yaml::to_string(spec)
        .map_err(|e| Error::Serialization(format!("Failed to serialize config: {e}")))?;
    std::fs::write(path, yaml)?;
    Ok(())
}
