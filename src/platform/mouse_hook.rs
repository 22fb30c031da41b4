//! Low-level mouse hook that feeds overlay clicks to the message loop.
//!
//! The hook runs on the UI thread's message pump. It only compares the
//! pointer against the last published overlay bounds; button events inside
//! them are forwarded over a channel and swallowed, everything else passes
//! through untouched.

use anyhow::{anyhow, Result};
use crossbeam::channel::Sender;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{debug, warn};
use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, PostMessageW, SetWindowsHookExW, UnhookWindowsHookEx, HC_ACTION, HHOOK, MSLLHOOKSTRUCT,
    WH_MOUSE_LL, WM_LBUTTONDOWN, WM_LBUTTONUP, WM_MBUTTONDOWN, WM_MBUTTONUP, WM_RBUTTONDOWN, WM_RBUTTONUP,
};

use super::WM_OVERLAY_POINTER;
use crate::input::{PointerButton, PointerEvent};
use crate::layout::Geometry;

/// Where hooked events go.
struct HookTarget {
    sender: Sender<PointerEvent>,
    hwnd: HWND,
    bounds: Geometry,
}

/// Global mouse hook handle
static MOUSE_HOOK: Lazy<Mutex<Option<HHOOK>>> = Lazy::new(|| Mutex::new(None));

static HOOK_TARGET: Lazy<Mutex<Option<HookTarget>>> = Lazy::new(|| Mutex::new(None));

/// Install the hook. Events inside the published bounds are sent to
/// `sender` and `hwnd` is woken with [`WM_OVERLAY_POINTER`].
pub fn install_mouse_hook(sender: Sender<PointerEvent>, hwnd: HWND) -> Result<()> {
    *HOOK_TARGET.lock() = Some(HookTarget {
        sender,
        hwnd,
        bounds: Geometry::default(),
    });

    let hook = unsafe {
        SetWindowsHookExW(WH_MOUSE_LL, Some(mouse_proc), None, 0)
            .map_err(|e| anyhow!("Failed to install mouse hook: {}", e))?
    };

    debug!("Mouse hook installed");
    *MOUSE_HOOK.lock() = Some(hook);
    Ok(())
}

/// Update the rectangle the hook treats as the overlay.
pub fn publish_bounds(bounds: Geometry) {
    if let Some(target) = HOOK_TARGET.lock().as_mut() {
        target.bounds = bounds;
    }
}

pub fn uninstall_mouse_hook() {
    if let Some(hook) = MOUSE_HOOK.lock().take() {
        unsafe {
            let _ = UnhookWindowsHookEx(hook);
        }
        debug!("Mouse hook uninstalled");
    }
    *HOOK_TARGET.lock() = None;
}

fn button_event(message: u32) -> Option<(PointerButton, bool)> {
    match message {
        WM_LBUTTONDOWN => Some((PointerButton::Left, true)),
        WM_LBUTTONUP => Some((PointerButton::Left, false)),
        WM_RBUTTONDOWN => Some((PointerButton::Right, true)),
        WM_RBUTTONUP => Some((PointerButton::Right, false)),
        WM_MBUTTONDOWN => Some((PointerButton::Middle, true)),
        WM_MBUTTONUP => Some((PointerButton::Middle, false)),
        _ => None,
    }
}

unsafe extern "system" fn mouse_proc(n_code: i32, w_param: WPARAM, l_param: LPARAM) -> LRESULT {
    if n_code == HC_ACTION as i32 {
        if let Some((button, pressed)) = button_event(w_param.0 as u32) {
            let info = &*(l_param.0 as *const MSLLHOOKSTRUCT);
            let event = PointerEvent {
                x: info.pt.x,
                y: info.pt.y,
                button,
                pressed,
            };

            if let Some(target) = HOOK_TARGET.lock().as_ref() {
                if target.bounds.contains(event.x, event.y) {
                    if let Err(e) = target.sender.try_send(event) {
                        warn!("Dropped overlay click: {}", e);
                    }
                    let _ = PostMessageW(target.hwnd, WM_OVERLAY_POINTER, WPARAM(0), LPARAM(0));
                    // Swallow: nothing underneath sees this click
                    return LRESULT(1);
                }
            }
        }
    }

    CallNextHookEx(None, n_code, w_param, l_param)
}
