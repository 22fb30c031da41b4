//! taskmon library
//!
//! A taskbar system monitor: CPU, memory, network and GPU sparklines drawn
//! into a layered, always-on-top window parked next to the notification
//! area.
//!
//! The engine ([`overlay::Overlay`]) is platform-free and talks to the
//! desktop through [`shell::ShellIntegration`]; the Windows host lives in
//! `platform`.

pub mod compositor;
pub mod config;
pub mod error;
pub mod input;
pub mod layout;
pub mod logging;
pub mod metrics;
pub mod overlay;
pub mod shell;

#[cfg(windows)]
pub mod platform;
