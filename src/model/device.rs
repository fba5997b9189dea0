//! Compute device selection
//!
//! The launcher exports `LOCAL_RANK` for each process; the model is placed on
//! the CUDA device with that index, or on the CPU when no GPU is visible.

use std::fmt;

/// Environment variable holding the process-local device index
pub const LOCAL_RANK_ENV: &str = "LOCAL_RANK";

/// Compute device for training
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeDevice {
    /// CPU-only execution
    Cpu,
    /// CUDA GPU with device ID
    Cuda { device_id: usize },
}

impl ComputeDevice {
    /// Device for a local rank: `Cuda { device_id: rank }` when CUDA is
    /// available, CPU otherwise
    #[must_use]
    pub fn from_local_rank(local_rank: usize) -> Self {
        Self::select(local_rank, Self::cuda_available())
    }

    /// Device for a local rank given CUDA availability
    #[must_use]
    pub const fn select(local_rank: usize, cuda_available: bool) -> Self {
        if cuda_available {
            Self::Cuda { device_id: local_rank }
        } else {
            Self::Cpu
        }
    }

    /// Check if CUDA is available
    #[must_use]
    pub fn cuda_available() -> bool {
        if std::env::var("CUDA_VISIBLE_DEVICES").is_ok_and(|v| !v.is_empty() && v != "-1") {
            return true;
        }

        std::process::Command::new("nvidia-smi")
            .arg("--query-gpu=name")
            .arg("--format=csv,noheader")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// Check if this device is CUDA
    #[must_use]
    pub const fn is_cuda(&self) -> bool {
        matches!(self, Self::Cuda { .. })
    }

    /// Get device ID for CUDA devices
    #[must_use]
    pub const fn device_id(&self) -> Option<usize> {
        match self {
            Self::Cuda { device_id } => Some(*device_id),
            Self::Cpu => None,
        }
    }
}

impl fmt::Display for ComputeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "CPU"),
            Self::Cuda { device_id } => write!(f, "CUDA:{device_id}"),
        }
    }
}

/// Parse a `LOCAL_RANK` value; unset or empty means rank 0
#[must_use]
pub fn parse_local_rank(value: Option<&str>) -> Option<usize> {
    match value.map(str::trim) {
        None | Some("") => Some(0),
        Some(v) => v.parse().ok(),
    }
}
