//! Windows integration: layered window host, shell probing, pointer hook
//! and tray icon. Only built on Windows.

mod host;
mod mouse_hook;
mod tray;
mod win32_shell;

use windows::Win32::UI::WindowsAndMessaging::WM_APP;

pub use host::run;
pub use win32_shell::Win32Shell;

/// Posted by the pointer hook when clicks are queued.
pub(crate) const WM_OVERLAY_POINTER: u32 = WM_APP + 1;
/// Posted when tray icon or tray menu events are queued.
pub(crate) const WM_OVERLAY_TRAY: u32 = WM_APP + 2;
