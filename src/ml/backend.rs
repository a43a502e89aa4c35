// ============================================================
// Layer 5 — Backend Selection
// ============================================================
// SESSION_CONFIG.DEVICE picks the Burn backend:
//
//   gpu  → Wgpu     (Vulkan / Metal / DX12 via wgpu)
//   cpu  → NdArray  (pure Rust, no GPU required)
//
// Training wraps either one in Autodiff; evaluation uses the
// plain backend.

use std::str::FromStr;

use crate::domain::errors::ConfigError;

pub type GpuBackend = burn::backend::Wgpu;
pub type CpuBackend = burn::backend::NdArray;

pub type GpuTrainBackend = burn::backend::Autodiff<GpuBackend>;
pub type CpuTrainBackend = burn::backend::Autodiff<CpuBackend>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Gpu,
    Cpu,
}

impl FromStr for DeviceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gpu" => Ok(Self::Gpu),
            "cpu" => Ok(Self::Cpu),
            _     => Err(ConfigError::UnknownDevice(s.to_string())),
        }
    }
}
