//! CPU and memory probes backed by `sysinfo`.

use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};

use super::sources::{CpuProbe, MemoryProbe};
use crate::error::SampleError;

/// Aggregate and per-core CPU usage.
pub struct SysinfoCpu {
    system: System,
    core_count: usize,
}

impl SysinfoCpu {
    pub fn new() -> Self {
        // Only cpu_usage: frequency polling is overhead we never display
        let system = System::new_with_specifics(
            RefreshKind::new().with_cpu(CpuRefreshKind::new().with_cpu_usage()),
        );
        let core_count = system.cpus().len().max(1);

        Self { system, core_count }
    }
}

impl Default for SysinfoCpu {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuProbe for SysinfoCpu {
    fn core_count(&self) -> usize {
        self.core_count
    }

    fn read(&mut self, per_core: &mut [f32]) -> Result<f32, SampleError> {
        self.system.refresh_cpu();

        let cpus = self.system.cpus();
        if cpus.is_empty() {
            return Err(SampleError::Unavailable("no CPU counters".into()));
        }

        for (slot, cpu) in per_core.iter_mut().zip(cpus) {
            *slot = cpu.cpu_usage();
        }

        Ok(self.system.global_cpu_info().cpu_usage())
    }
}

/// Physical memory. Total is captured once; available is re-queried.
pub struct SysinfoMemory {
    system: System,
    total: u64,
}

impl SysinfoMemory {
    pub fn new() -> Self {
        let system = System::new_with_specifics(
            RefreshKind::new().with_memory(MemoryRefreshKind::everything()),
        );
        let total = system.total_memory();

        Self { system, total }
    }
}

impl Default for SysinfoMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SysinfoMemory {
    fn total_bytes(&self) -> u64 {
        self.total
    }

    fn available_bytes(&mut self) -> Result<u64, SampleError> {
        self.system.refresh_memory();
        Ok(self.system.available_memory())
    }
}
