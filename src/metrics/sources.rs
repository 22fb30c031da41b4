//! Metric source seams.
//!
//! The sampler only talks to these traits. Live implementations wrap
//! `sysinfo` and NVML; tests plug in scripted fakes.

use crate::error::SampleError;

/// Per-core and aggregate CPU utilisation.
pub trait CpuProbe {
    /// Number of logical cores. Fixed for the process lifetime.
    fn core_count(&self) -> usize;

    /// Refresh counters, write raw per-core percentages into `per_core`
    /// (length `core_count()`) and return the raw aggregate percentage.
    /// Values may be out of range; the sampler clamps them.
    fn read(&mut self, per_core: &mut [f32]) -> Result<f32, SampleError>;
}

/// Physical memory counters.
pub trait MemoryProbe {
    /// Total installed memory in bytes, read once at construction.
    fn total_bytes(&self) -> u64;

    /// Currently available memory in bytes.
    fn available_bytes(&mut self) -> Result<u64, SampleError>;
}

/// Throughput of the selected interface since the previous read.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NetRates {
    pub up_bps: f32,
    pub down_bps: f32,
}

pub trait NetworkProbe {
    /// Name of the interface this probe is bound to.
    fn interface(&self) -> &str;

    fn read(&mut self) -> Result<NetRates, SampleError>;
}

/// One GPU reading. Either half may be missing if the driver refuses it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GpuReading {
    pub util: Option<f32>,
    pub temp_c: Option<u32>,
}

pub trait GpuProbe {
    fn read(&mut self) -> Result<GpuReading, SampleError>;
}

/// The full set of sources handed to [`Sampler::new`](super::Sampler::new).
///
/// `network` and `gpu` are optional: `None` means the source could not be
/// opened and the metric stays unavailable for the process lifetime.
pub struct Probes {
    pub cpu: Box<dyn CpuProbe>,
    pub memory: Box<dyn MemoryProbe>,
    pub network: Option<Box<dyn NetworkProbe>>,
    pub gpu: Option<Box<dyn GpuProbe>>,
}
