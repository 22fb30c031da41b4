/// Configuration snapshot consumed by the overlay.
///
/// This module provides:
/// - `OverlayConfig`: which panels are visible, colours, interval, opacity
///   and the network adapter selector
/// - Loading `settings.json` from the platform data directory
///   (%APPDATA%/taskmon/ on Windows), falling back to defaults on any error
/// - `ConfigWatcher`, which notices edits to the file between ticks
///
/// The overlay never writes settings back; the only write is
/// `ensure_config_file`, which seeds a default file for the editor.
use anyhow::{anyhow, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

use crate::metrics::AUTO_ADAPTER;

/// Lower bound for the sample interval.
pub const MIN_INTERVAL_MS: u64 = 250;
/// Lower bound for opacity so the overlay never disappears entirely.
pub const MIN_OPACITY: f64 = 0.1;

const CONFIG_FILE: &str = "settings.json";

/// How the CPU panel is drawn.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CpuMode {
    /// One sparkline for overall CPU%.
    #[default]
    Aggregate,
    /// Grid of vertical bars, one per logical core.
    PerCore,
}

/// Overlay settings as read from `settings.json`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct OverlayConfig {
    pub show_net_up: bool,
    pub show_net_down: bool,
    pub show_cpu: bool,
    pub cpu_mode: CpuMode,
    pub show_gpu_util: bool,
    pub show_gpu_temp: bool,
    pub show_memory: bool,
    /// `"auto"` or (part of) an adapter name.
    pub network_adapter: String,
    pub update_interval_ms: u64,
    /// 1.0 = opaque.
    pub opacity: f64,
    /// Consumed by the installer/startup collaborator, not the overlay.
    pub run_on_startup: bool,
    pub color_net_up: String,
    pub color_net_down: String,
    pub color_cpu: String,
    pub color_gpu: String,
    pub color_gpu_temp: String,
    pub color_memory: String,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        OverlayConfig {
            show_net_up: true,
            show_net_down: true,
            show_cpu: true,
            cpu_mode: CpuMode::Aggregate,
            show_gpu_util: true,
            show_gpu_temp: true,
            show_memory: true,
            network_adapter: AUTO_ADAPTER.to_string(),
            update_interval_ms: 1000,
            opacity: 1.0,
            run_on_startup: true,
            color_net_up: DEFAULT_COLORS.net_up.to_hex(),
            color_net_down: DEFAULT_COLORS.net_down.to_hex(),
            color_cpu: DEFAULT_COLORS.cpu.to_hex(),
            color_gpu: DEFAULT_COLORS.gpu.to_hex(),
            color_gpu_temp: DEFAULT_COLORS.gpu_temp.to_hex(),
            color_memory: DEFAULT_COLORS.memory.to_hex(),
        }
    }
}

impl OverlayConfig {
    /// Copy with interval and opacity clamped into their safe ranges.
    pub fn normalized(mut self) -> Self {
        self.update_interval_ms = self.update_interval_ms.max(MIN_INTERVAL_MS);
        self.opacity = clamp_opacity(self.opacity);
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms.max(MIN_INTERVAL_MS))
    }

    /// GPU panel is shown when either of its readouts is enabled.
    pub fn show_gpu(&self) -> bool {
        self.show_gpu_util || self.show_gpu_temp
    }

    /// Parsed colours, each falling back to its default when invalid.
    pub fn colors(&self) -> PanelColors {
        PanelColors {
            net_up: Rgba::parse_hex(&self.color_net_up).unwrap_or(DEFAULT_COLORS.net_up),
            net_down: Rgba::parse_hex(&self.color_net_down).unwrap_or(DEFAULT_COLORS.net_down),
            cpu: Rgba::parse_hex(&self.color_cpu).unwrap_or(DEFAULT_COLORS.cpu),
            gpu: Rgba::parse_hex(&self.color_gpu).unwrap_or(DEFAULT_COLORS.gpu),
            gpu_temp: Rgba::parse_hex(&self.color_gpu_temp).unwrap_or(DEFAULT_COLORS.gpu_temp),
            memory: Rgba::parse_hex(&self.color_memory).unwrap_or(DEFAULT_COLORS.memory),
        }
    }

    /// Global layer alpha derived from opacity, never fully transparent.
    pub fn global_alpha(&self) -> u8 {
        ((clamp_opacity(self.opacity) * 255.0).round() as u8).max(1)
    }
}

fn clamp_opacity(opacity: f64) -> f64 {
    if opacity.is_nan() {
        1.0
    } else {
        opacity.clamp(MIN_OPACITY, 1.0)
    }
}

/// Straight (non-premultiplied) RGBA colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Rgba { r, g, b, a: 255 }
    }

    /// Parse `#RRGGBB` or `#AARRGGBB` (leading `#` optional).
    pub fn parse_hex(s: &str) -> Option<Self> {
        let hex = s.trim().trim_start_matches('#');
        if !hex.is_ascii() {
            return None;
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        match hex.len() {
            6 => Some(Rgba::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Some(Rgba {
                a: byte(0)?,
                r: byte(2)?,
                g: byte(4)?,
                b: byte(6)?,
            }),
            _ => None,
        }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// One colour per plotted metric.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PanelColors {
    pub net_up: Rgba,
    pub net_down: Rgba,
    pub cpu: Rgba,
    pub gpu: Rgba,
    pub gpu_temp: Rgba,
    pub memory: Rgba,
}

pub const DEFAULT_COLORS: PanelColors = PanelColors {
    net_up: Rgba::rgb(0xFF, 0x40, 0x40),
    net_down: Rgba::rgb(0x00, 0xFF, 0x88),
    cpu: Rgba::rgb(0xFF, 0xB3, 0x00),
    gpu: Rgba::rgb(0xFF, 0x6B, 0x35),
    gpu_temp: Rgba::rgb(0xFF, 0xDD, 0x44),
    memory: Rgba::rgb(0xCC, 0x44, 0xFF),
};

/// Get the application's data directory
/// Returns %APPDATA%/taskmon/ on Windows
/// Creates directory if it doesn't exist
pub fn get_data_directory() -> Result<PathBuf> {
    let project_dirs = ProjectDirs::from("", "", "taskmon")
        .ok_or_else(|| anyhow!("Failed to determine user data directory"))?;

    let data_dir = project_dirs.data_dir();

    fs::create_dir_all(data_dir)
        .map_err(|e| anyhow!("Failed to create data directory: {}", e))?;

    Ok(data_dir.to_path_buf())
}

/// Location of `settings.json`.
pub fn config_path() -> Result<PathBuf> {
    Ok(get_data_directory()?.join(CONFIG_FILE))
}

/// Load configuration from the data directory.
/// Returns default config if the file doesn't exist or on error.
pub fn load_config() -> OverlayConfig {
    match config_path() {
        Ok(path) => load_config_from(&path),
        Err(e) => {
            warn!("No data directory ({}); using default settings", e);
            OverlayConfig::default()
        }
    }
}

/// Load and normalise `path`, falling back to defaults.
pub fn load_config_from(path: &Path) -> OverlayConfig {
    if !path.exists() {
        return OverlayConfig::default();
    }

    let Ok(contents) = fs::read_to_string(path) else {
        warn!("Cannot read {}; using default settings", path.display());
        return OverlayConfig::default();
    };

    match serde_json::from_str::<OverlayConfig>(&contents) {
        Ok(config) => config.normalized(),
        Err(e) => {
            warn!("Invalid settings file {}: {}; using defaults", path.display(), e);
            OverlayConfig::default()
        }
    }
}

/// Write a default settings file if none exists yet, so "Settings…" has
/// something to open.
pub fn ensure_config_file(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }

    let json = serde_json::to_string_pretty(&OverlayConfig::default())
        .map_err(|e| anyhow!("Failed to serialize settings: {}", e))?;

    fs::write(path, json)
        .map_err(|e| anyhow!("Failed to write {}: {}", path.display(), e))?;

    Ok(())
}

/// Detects edits to the settings file by modification time.
pub struct ConfigWatcher {
    path: PathBuf,
    last_modified: Option<SystemTime>,
}

impl ConfigWatcher {
    pub fn new(path: PathBuf) -> Self {
        let last_modified = modified_time(&path);
        Self { path, last_modified }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Freshly loaded config if the file changed since the last poll.
    pub fn poll(&mut self) -> Option<OverlayConfig> {
        let modified = modified_time(&self.path);
        if modified == self.last_modified {
            return None;
        }

        debug!("Settings file changed, reloading");
        self.last_modified = modified;
        Some(load_config_from(&self.path))
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}
