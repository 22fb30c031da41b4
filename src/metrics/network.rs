//! Network adapter selection and the `sysinfo`-backed throughput probe.

use std::time::Instant;

use sysinfo::Networks;
use tracing::{debug, info, warn};

use super::sources::{NetRates, NetworkProbe};
use crate::error::SampleError;

/// Selector value that asks for automatic adapter choice.
pub const AUTO_ADAPTER: &str = "auto";

/// Name fragments of virtual adapters skipped by automatic selection.
const EXCLUDED_FRAGMENTS: &[&str] = &["loopback", "isatap", "pseudo", "teredo", "6to4"];

/// True for loopback, tunnel and pseudo adapters.
pub fn is_virtual_adapter(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower == "lo" || EXCLUDED_FRAGMENTS.iter().any(|f| lower.contains(f))
}

/// Pick an interface from `names` according to `selector`.
///
/// `"auto"` takes the first non-virtual adapter; anything else is a
/// case-insensitive substring match. Either way an empty pool falls back to
/// the first entry of the full list. Returns `None` only for an empty list.
pub fn select_adapter(names: &[String], selector: &str) -> Option<String> {
    let selector = selector.trim();
    let pick = if selector.is_empty() || selector.eq_ignore_ascii_case(AUTO_ADAPTER) {
        names.iter().find(|n| !is_virtual_adapter(n))
    } else {
        let needle = selector.to_lowercase();
        names.iter().find(|n| n.to_lowercase().contains(&needle))
    };

    pick.or_else(|| names.first()).cloned()
}

/// Throughput of one interface, computed from `sysinfo` byte deltas.
pub struct SysinfoNetwork {
    networks: Networks,
    interface: String,
    last_read: Instant,
}

impl SysinfoNetwork {
    /// Enumerate interfaces and bind to the one chosen by `selector`.
    ///
    /// Returns `None` when enumeration yields nothing; network metrics are
    /// then off for the rest of the process.
    pub fn open(selector: &str) -> Option<Self> {
        let networks = Networks::new_with_refreshed_list();

        let mut names: Vec<String> = networks.list().keys().cloned().collect();
        names.sort();
        debug!("Network interfaces: {:?}", names);

        let Some(interface) = select_adapter(&names, selector) else {
            warn!("No network interfaces found; network panels will stay empty");
            return None;
        };

        info!("Monitoring network interface '{}' (selector '{}')", interface, selector);

        Some(Self {
            networks,
            interface,
            last_read: Instant::now(),
        })
    }
}

impl NetworkProbe for SysinfoNetwork {
    fn interface(&self) -> &str {
        &self.interface
    }

    fn read(&mut self) -> Result<NetRates, SampleError> {
        self.networks.refresh();

        let now = Instant::now();
        let elapsed = now.duration_since(self.last_read).as_secs_f32();
        self.last_read = now;

        let data = self
            .networks
            .list()
            .get(&self.interface)
            .ok_or_else(|| SampleError::InterfaceGone(self.interface.clone()))?;

        if elapsed <= f32::EPSILON {
            return Ok(NetRates::default());
        }

        Ok(NetRates {
            up_bps: data.transmitted() as f32 / elapsed,
            down_bps: data.received() as f32 / elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_auto_skips_virtual_adapters() {
        let list = names(&[
            "Loopback Pseudo-Interface 1",
            "isatap.{1234}",
            "Teredo Tunneling Pseudo-Interface",
            "Ethernet",
            "Wi-Fi",
        ]);
        assert_eq!(select_adapter(&list, "auto").as_deref(), Some("Ethernet"));
    }

    #[test]
    fn test_auto_is_case_insensitive_and_skips_lo() {
        let list = names(&["lo", "eth0"]);
        assert_eq!(select_adapter(&list, "AUTO").as_deref(), Some("eth0"));
    }

    #[test]
    fn test_auto_falls_back_to_full_list() {
        let list = names(&["Loopback Pseudo-Interface 1", "6to4 Adapter"]);
        assert_eq!(
            select_adapter(&list, "auto").as_deref(),
            Some("Loopback Pseudo-Interface 1")
        );
    }

    #[test]
    fn test_named_selector_substring_match() {
        let list = names(&["Ethernet", "Wi-Fi 2", "Bluetooth Network Connection"]);
        assert_eq!(select_adapter(&list, "wi-fi").as_deref(), Some("Wi-Fi 2"));
    }

    #[test]
    fn test_named_selector_without_match_uses_first() {
        let list = names(&["Ethernet", "Wi-Fi"]);
        assert_eq!(select_adapter(&list, "VPN").as_deref(), Some("Ethernet"));
    }

    #[test]
    fn test_empty_list_selects_nothing() {
        assert_eq!(select_adapter(&[], "auto"), None);
        assert_eq!(select_adapter(&[], "Ethernet"), None);
    }
}
