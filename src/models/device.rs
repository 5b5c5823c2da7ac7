//! Device placement and numeric precision for model loading

use anyhow::Result;
use candle_core::{DType, Device};
use serde::{Deserialize, Serialize};

/// Where model weights should be placed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePreference {
    Cuda,
    Metal,
    Cpu,
    #[default]
    Auto,
}

impl std::str::FromStr for DevicePreference {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "cuda" | "gpu" => Ok(Self::Cuda),
            "metal" => Ok(Self::Metal),
            "cpu" => Ok(Self::Cpu),
            "auto" => Ok(Self::Auto),
            _ => Err(anyhow::anyhow!(
                "Invalid device preference: {}. Valid options: cuda, metal, cpu, auto",
                s
            )),
        }
    }
}

impl std::fmt::Display for DevicePreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cuda => write!(f, "cuda"),
            Self::Metal => write!(f, "metal"),
            Self::Cpu => write!(f, "cpu"),
            Self::Auto => write!(f, "auto"),
        }
    }
}

/// Numeric precision used for model weights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    #[default]
    F16,
    Bf16,
    F32,
}

impl Precision {
    /// Candle dtype for this precision
    pub fn to_dtype(self) -> DType {
        match self {
            Self::F16 => DType::F16,
            Self::Bf16 => DType::BF16,
            Self::F32 => DType::F32,
        }
    }
}

impl std::str::FromStr for Precision {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "f16" | "float16" | "half" => Ok(Self::F16),
            "bf16" | "bfloat16" => Ok(Self::Bf16),
            "f32" | "float32" => Ok(Self::F32),
            _ => Err(anyhow::anyhow!(
                "Invalid precision: {}. Valid options: f16, bf16, f32",
                s
            )),
        }
    }
}

impl std::fmt::Display for Precision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::F16 => write!(f, "f16"),
            Self::Bf16 => write!(f, "bf16"),
            Self::F32 => write!(f, "f32"),
        }
    }
}

/// Select device based on preference
///
/// Explicit GPU requests fall back to CPU when the backend is not compiled in
/// or fails to initialize.
pub fn select_device(preference: DevicePreference) -> Result<Device> {
    match preference {
        DevicePreference::Cuda => {
            #[cfg(feature = "cuda")]
            {
                match Device::new_cuda(0) {
                    Ok(device) => {
                        tracing::info!("CUDA device selected");
                        Ok(device)
                    }
                    Err(e) => {
                        tracing::warn!("CUDA initialization failed: {}, falling back to CPU", e);
                        Ok(Device::Cpu)
                    }
                }
            }
            #[cfg(not(feature = "cuda"))]
            {
                tracing::warn!("CUDA requested but not compiled with 'cuda' feature, falling back to CPU");
                Ok(Device::Cpu)
            }
        }

        DevicePreference::Metal => {
            #[cfg(feature = "metal")]
            {
                match Device::new_metal(0) {
                    Ok(device) => {
                        tracing::info!("Metal device selected");
                        Ok(device)
                    }
                    Err(e) => {
                        tracing::warn!("Metal initialization failed: {}, falling back to CPU", e);
                        Ok(Device::Cpu)
                    }
                }
            }
            #[cfg(not(feature = "metal"))]
            {
                tracing::warn!("Metal requested but not compiled with 'metal' feature, falling back to CPU");
                Ok(Device::Cpu)
            }
        }

        DevicePreference::Cpu => {
            tracing::info!("CPU device selected");
            Ok(Device::Cpu)
        }

        DevicePreference::Auto => {
            #[cfg(feature = "cuda")]
            {
                if let Ok(device) = Device::new_cuda(0) {
                    tracing::info!("Auto-selected: CUDA GPU");
                    return Ok(device);
                }
            }

            #[cfg(feature = "metal")]
            {
                if let Ok(device) = Device::new_metal(0) {
                    tracing::info!("Auto-selected: Metal GPU");
                    return Ok(device);
                }
            }

            tracing::info!("Auto-selected: CPU");
            Ok(Device::Cpu)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_preference_from_str() {
        assert_eq!(
            "cuda".parse::<DevicePreference>().unwrap(),
            DevicePreference::Cuda
        );
        assert_eq!(
            "GPU".parse::<DevicePreference>().unwrap(),
            DevicePreference::Cuda
        );
        assert_eq!(
            "auto".parse::<DevicePreference>().unwrap(),
            DevicePreference::Auto
        );
        assert!("tpu".parse::<DevicePreference>().is_err());
    }

    #[test]
    fn test_precision_dtype() {
        assert_eq!(Precision::default(), Precision::F16);
        assert_eq!("half".parse::<Precision>().unwrap().to_dtype(), DType::F16);
        assert_eq!(Precision::Bf16.to_dtype(), DType::BF16);
        assert_eq!(Precision::F32.to_string(), "f32");
    }

    #[test]
    fn test_cpu_always_available() {
        let device = select_device(DevicePreference::Cpu).unwrap();
        assert!(matches!(device, Device::Cpu));
    }
}
