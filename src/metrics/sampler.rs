//! Per-tick metric sampling.

use tracing::{debug, info, warn};

use super::gpu::NvmlGpu;
use super::history::{HistorySeries, HISTORY_LEN};
use super::network::SysinfoNetwork;
use super::sources::{GpuProbe, NetworkProbe, Probes};
use super::system::{SysinfoCpu, SysinfoMemory};

/// Current values, rewritten in place by [`Sampler::sample`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricSnapshot {
    pub cpu_total: f32,
    /// One entry per logical core.
    pub cpu_per_core: Vec<f32>,
    pub mem_percent: f32,
    pub net_up_bps: f32,
    pub net_down_bps: f32,
    pub gpu_util: f32,
    pub gpu_temp_c: u32,
    pub gpu_available: bool,
    pub net_available: bool,
}

/// Sparkline history, one series per plotted metric.
#[derive(Debug, Clone)]
pub struct MetricHistory {
    pub cpu: HistorySeries,
    pub cores: Vec<HistorySeries>,
    pub memory: HistorySeries,
    pub net_up: HistorySeries,
    pub net_down: HistorySeries,
    pub gpu: HistorySeries,
}

impl MetricHistory {
    pub fn new(core_count: usize) -> Self {
        Self {
            cpu: HistorySeries::new(HISTORY_LEN),
            cores: (0..core_count).map(|_| HistorySeries::new(HISTORY_LEN)).collect(),
            memory: HistorySeries::new(HISTORY_LEN),
            net_up: HistorySeries::new(HISTORY_LEN),
            net_down: HistorySeries::new(HISTORY_LEN),
            gpu: HistorySeries::new(HISTORY_LEN),
        }
    }
}

/// Ceiling used to normalise the network sparklines.
///
/// Rises immediately to a larger peak, otherwise decays by [`Self::DECAY`]
/// per sample, and never drops below [`Self::FLOOR`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkAutoScale {
    ceiling: f32,
}

impl NetworkAutoScale {
    /// 1 MiB/s.
    pub const FLOOR: f32 = 1024.0 * 1024.0;
    /// About 0.05% per sample.
    pub const DECAY: f32 = 0.9995;

    pub fn new() -> Self {
        Self {
            ceiling: Self::FLOOR,
        }
    }

    pub fn ceiling(&self) -> f32 {
        self.ceiling
    }

    /// Fold in this tick's peak throughput and return the new ceiling.
    pub fn observe(&mut self, peak: f32) -> f32 {
        // Decay first so a new peak is never shaved by the same tick's decay
        self.ceiling = (self.ceiling * Self::DECAY).max(Self::FLOOR);
        if peak.is_finite() && peak > self.ceiling {
            self.ceiling = peak;
        }
        self.ceiling
    }
}

impl Default for NetworkAutoScale {
    fn default() -> Self {
        Self::new()
    }
}

/// Clamp a raw percentage into `[0, 100]`. NaN becomes 0.
pub fn clamp_percent(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// Owns every metric source plus the snapshot and history they feed.
///
/// Called from the UI thread only; every read is expected to take
/// microseconds.
pub struct Sampler {
    probes: Probes,
    snapshot: MetricSnapshot,
    history: MetricHistory,
    net_scale: NetworkAutoScale,
    mem_total: u64,
}

impl Sampler {
    /// Build a sampler and prime every rate source.
    ///
    /// Rate counters report zero on their first read, so one throwaway read
    /// happens here and the first real tick shows correct values.
    pub fn new(mut probes: Probes) -> Self {
        let core_count = probes.cpu.core_count().max(1);
        let mem_total = probes.memory.total_bytes();

        let mut snapshot = MetricSnapshot {
            cpu_per_core: vec![0.0; core_count],
            net_available: probes.network.is_some(),
            gpu_available: probes.gpu.is_some(),
            ..MetricSnapshot::default()
        };

        if let Err(e) = probes.cpu.read(&mut snapshot.cpu_per_core) {
            debug!("CPU priming read failed: {}", e);
        }
        snapshot.cpu_per_core.iter_mut().for_each(|v| *v = 0.0);

        if let Some(net) = probes.network.as_mut() {
            if let Err(e) = net.read() {
                debug!("Network priming read failed: {}", e);
            }
        }

        Self {
            probes,
            snapshot,
            history: MetricHistory::new(core_count),
            net_scale: NetworkAutoScale::new(),
            mem_total,
        }
    }

    /// Sampler over the live system: `sysinfo` for CPU, memory and network,
    /// NVML for the GPU when present.
    pub fn from_system(adapter: &str) -> Self {
        let network = SysinfoNetwork::open(adapter).map(|n| Box::new(n) as Box<dyn NetworkProbe>);

        let gpu = match NvmlGpu::open() {
            Ok(gpu) => {
                info!("NVML initialised; GPU metrics enabled");
                Some(Box::new(gpu) as Box<dyn GpuProbe>)
            }
            Err(e) => {
                info!("NVML unavailable ({}); GPU metrics disabled", e);
                None
            }
        };

        Self::new(Probes {
            cpu: Box::new(SysinfoCpu::new()),
            memory: Box::new(SysinfoMemory::new()),
            network,
            gpu,
        })
    }

    pub fn snapshot(&self) -> &MetricSnapshot {
        &self.snapshot
    }

    pub fn history(&self) -> &MetricHistory {
        &self.history
    }

    pub fn core_count(&self) -> usize {
        self.snapshot.cpu_per_core.len()
    }

    /// Current network normalisation ceiling.
    pub fn net_scale(&self) -> f32 {
        self.net_scale.ceiling()
    }

    /// Name of the monitored interface, if any.
    pub fn network_interface(&self) -> Option<&str> {
        self.probes.network.as_ref().map(|n| n.interface())
    }

    /// Read every source once and push the results onto history.
    ///
    /// A failing source only affects its own metric.
    pub fn sample(&mut self) -> &MetricSnapshot {
        self.sample_cpu();
        self.sample_memory();
        self.sample_network();
        self.sample_gpu();
        &self.snapshot
    }

    fn sample_cpu(&mut self) {
        let snap = &mut self.snapshot;
        match self.probes.cpu.read(&mut snap.cpu_per_core) {
            Ok(total) => {
                snap.cpu_total = clamp_percent(total);
                snap.cpu_per_core.iter_mut().for_each(|v| *v = clamp_percent(*v));
            }
            Err(e) => debug!("CPU read failed: {}", e),
        }

        self.history.cpu.push(snap.cpu_total);
        for (series, value) in self.history.cores.iter_mut().zip(&snap.cpu_per_core) {
            series.push(*value);
        }
    }

    fn sample_memory(&mut self) {
        match self.probes.memory.available_bytes() {
            Ok(available) => {
                self.snapshot.mem_percent = if self.mem_total > 0 {
                    let used = self.mem_total as f64 - available as f64;
                    clamp_percent((used / self.mem_total as f64 * 100.0) as f32)
                } else {
                    0.0
                };
            }
            Err(e) => debug!("Memory read failed: {}", e),
        }
        self.history.memory.push(self.snapshot.mem_percent);
    }

    fn sample_network(&mut self) {
        if let Some(net) = self.probes.network.as_mut() {
            match net.read() {
                Ok(rates) => {
                    self.snapshot.net_up_bps = rates.up_bps.max(0.0);
                    self.snapshot.net_down_bps = rates.down_bps.max(0.0);
                    self.snapshot.net_available = true;
                }
                Err(e) => {
                    debug!("Network read failed: {}", e);
                    self.snapshot.net_up_bps = 0.0;
                    self.snapshot.net_down_bps = 0.0;
                    self.snapshot.net_available = false;
                }
            }
            let peak = self.snapshot.net_up_bps.max(self.snapshot.net_down_bps);
            self.net_scale.observe(peak);
        }

        self.history.net_up.push(self.snapshot.net_up_bps);
        self.history.net_down.push(self.snapshot.net_down_bps);
    }

    fn sample_gpu(&mut self) {
        if let Some(gpu) = self.probes.gpu.as_mut() {
            match gpu.read() {
                Ok(reading) => {
                    if let Some(util) = reading.util {
                        self.snapshot.gpu_util = clamp_percent(util);
                    }
                    if let Some(temp) = reading.temp_c {
                        self.snapshot.gpu_temp_c = temp;
                    }
                    self.snapshot.gpu_available = true;
                }
                Err(e) => {
                    if self.snapshot.gpu_available {
                        warn!("GPU read failed, keeping last values: {}", e);
                    }
                    self.snapshot.gpu_available = false;
                }
            }
        }
        self.history.gpu.push(self.snapshot.gpu_util);
    }
}
