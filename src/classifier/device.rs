//! Compute device selection
//!
//! Chosen once while the classifier is loaded; every forward pass reuses it.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Requested device, from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DevicePreference {
    /// Accelerator when available, CPU otherwise
    #[default]
    Auto,
    Cpu,
    Cuda,
}

impl FromStr for DevicePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" | "gpu" => Ok(Self::Cuda),
            other => Err(format!("unknown device: {}", other)),
        }
    }
}

/// Device actually in use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Cpu,
    Cuda,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda => write!(f, "cuda"),
        }
    }
}

/// Resolve a preference against what this build and host can provide
pub fn select_device(preference: DevicePreference) -> Device {
    if preference == DevicePreference::Cpu {
        return Device::Cpu;
    }

    if cuda_available() {
        return Device::Cuda;
    }

    if preference == DevicePreference::Cuda {
        tracing::warn!("CUDA requested but not available, falling back to CPU");
    }
    Device::Cpu
}

#[cfg(feature = "cuda")]
fn cuda_available() -> bool {
    use ort::execution_providers::{CUDAExecutionProvider, ExecutionProvider};

    match CUDAExecutionProvider::default().is_available() {
        Ok(available) => available,
        Err(e) => {
            tracing::debug!("CUDA availability check failed: {}", e);
            false
        }
    }
}

#[cfg(not(feature = "cuda"))]
fn cuda_available() -> bool {
    false
}
