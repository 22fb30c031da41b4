//! taskmon - taskbar system monitor overlay
//!
//! Loads settings, builds the live metric sampler and hands both to the
//! Win32 host, which runs until Quit is chosen from a menu.

#![windows_subsystem = "windows"]

use anyhow::Result;
use tracing::{info, warn};

use taskmon::config::{config_path, get_data_directory, load_config};
use taskmon::logging;

fn main() -> Result<()> {
    let data_dir = get_data_directory().ok();
    let _log_guard = logging::init(logging::debug_requested(), data_dir.as_deref());

    info!("taskmon {} starting...", env!("CARGO_PKG_VERSION"));

    let config = load_config();
    let config_path = match config_path() {
        Ok(path) => Some(path),
        Err(e) => {
            warn!("Settings will not be reloaded: {}", e);
            None
        }
    };

    run(config, config_path)
}

#[cfg(windows)]
fn run(config: taskmon::config::OverlayConfig, config_path: Option<std::path::PathBuf>) -> Result<()> {
    let sampler = taskmon::metrics::Sampler::from_system(&config.network_adapter);
    if let Some(interface) = sampler.network_interface() {
        info!("Monitoring network interface '{}'", interface);
    }

    let result = taskmon::platform::run(config, sampler, config_path);
    if let Err(e) = &result {
        tracing::error!("Overlay failed: {:#}", e);
    }
    result
}

#[cfg(not(windows))]
fn run(_config: taskmon::config::OverlayConfig, _config_path: Option<std::path::PathBuf>) -> Result<()> {
    warn!("The taskbar overlay is Windows-only; exiting");
    Ok(())
}
