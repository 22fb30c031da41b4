//! NVIDIA GPU probe using NVML.
//!
//! NVML is loaded at runtime, so machines without NVIDIA drivers simply get
//! `None` from [`NvmlGpu::open`] and the GPU panel shows its last values.

use nvml_wrapper::enum_wrappers::device::TemperatureSensor;
use nvml_wrapper::error::NvmlError;
use nvml_wrapper::Nvml;
use tracing::debug;

use super::sources::{GpuProbe, GpuReading};
use crate::error::SampleError;

/// First NVIDIA device. The device handle borrows `Nvml`, so it is looked
/// up again on every read (a cheap in-driver call).
pub struct NvmlGpu {
    nvml: Nvml,
    device_index: u32,
}

impl NvmlGpu {
    pub fn open() -> Result<Self, NvmlError> {
        let nvml = Nvml::init()?;
        let device = nvml.device_by_index(0)?;
        if let Ok(name) = device.name() {
            debug!("NVML device 0: {}", name);
        }

        Ok(Self {
            nvml,
            device_index: 0,
        })
    }
}

impl GpuProbe for NvmlGpu {
    fn read(&mut self) -> Result<GpuReading, SampleError> {
        let device = self
            .nvml
            .device_by_index(self.device_index)
            .map_err(|e| SampleError::Gpu(e.to_string()))?;

        let util = device.utilization_rates().map(|u| u.gpu as f32).ok();
        let temp_c = device.temperature(TemperatureSensor::Gpu).ok();

        if util.is_none() && temp_c.is_none() {
            return Err(SampleError::Gpu("utilisation and temperature unavailable".into()));
        }

        Ok(GpuReading { util, temp_c })
    }
}
