//! Metric sampling: sources, history and the per-tick sampler.

mod gpu;
mod history;
mod network;
mod sampler;
mod sources;
mod system;

pub use gpu::NvmlGpu;
pub use history::{HistorySeries, HISTORY_LEN};
pub use network::{is_virtual_adapter, select_adapter, SysinfoNetwork, AUTO_ADAPTER};
pub use sampler::{clamp_percent, MetricHistory, MetricSnapshot, NetworkAutoScale, Sampler};
pub use sources::{CpuProbe, GpuProbe, GpuReading, MemoryProbe, NetRates, NetworkProbe, Probes};
pub use system::{SysinfoCpu, SysinfoMemory};
