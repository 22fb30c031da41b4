//! The seam between the overlay engine and the desktop shell.

use std::sync::atomic::{AtomicBool, Ordering};

use tiny_skia::Pixmap;

use crate::error::OverlayError;
use crate::layout::{Geometry, ScreenSize, TrayProbe};

/// Shell queries and window operations the overlay needs.
///
/// The Win32 host implements this over a layered topmost window; tests use
/// [`FixedShell`].
pub trait ShellIntegration {
    /// Taskbar, notification area and overflow button rectangles.
    /// Anything the shell cannot find is left as `None`/empty.
    fn probe_tray(&self) -> TrayProbe;

    fn screen_size(&self) -> ScreenSize;

    /// Show `surface` at `geometry` with the given global alpha.
    /// `surface` is premultiplied RGBA sized `geometry.width x geometry.height`.
    fn present(&mut self, surface: &Pixmap, geometry: Geometry, alpha: u8) -> Result<(), OverlayError>;

    /// Push the window back to the top of the topmost band.
    fn assert_topmost(&mut self);
}

/// One recorded call to [`ShellIntegration::present`].
#[derive(Debug, Clone)]
pub struct PresentedFrame {
    pub geometry: Geometry,
    pub alpha: u8,
    pub frame: Pixmap,
}

/// Shell with fixed geometry that records what it was asked to do.
#[derive(Debug, Clone)]
pub struct FixedShell {
    pub tray: TrayProbe,
    pub screen: ScreenSize,
    pub presented: Vec<PresentedFrame>,
    pub topmost_calls: usize,
    /// When set, every `present` fails with this message.
    pub fail_present: Option<String>,
}

impl FixedShell {
    pub fn new(tray: TrayProbe, screen: ScreenSize) -> Self {
        Self {
            tray,
            screen,
            presented: Vec::new(),
            topmost_calls: 0,
            fail_present: None,
        }
    }

    pub fn last_frame(&self) -> Option<&PresentedFrame> {
        self.presented.last()
    }
}

impl ShellIntegration for FixedShell {
    fn probe_tray(&self) -> TrayProbe {
        self.tray.clone()
    }

    fn screen_size(&self) -> ScreenSize {
        self.screen
    }

    fn present(&mut self, surface: &Pixmap, geometry: Geometry, alpha: u8) -> Result<(), OverlayError> {
        if let Some(message) = &self.fail_present {
            return Err(OverlayError::Present(message.clone()));
        }
        self.presented.push(PresentedFrame {
            geometry,
            alpha,
            frame: surface.clone(),
        });
        Ok(())
    }

    fn assert_topmost(&mut self) {
        self.topmost_calls += 1;
    }
}

/// Marks state that must not be entered twice on one thread.
///
/// Window procedures re-enter: moving the window from inside a tick
/// delivers `WM_WINDOWPOSCHANGED` before the tick returns. Handlers take
/// the flag before touching shared state and skip their work when it is
/// already held.
#[derive(Debug)]
pub struct ReentryFlag(AtomicBool);

impl ReentryFlag {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Take the flag, or `None` if a caller further up the stack holds it.
    pub fn try_enter(&self) -> Option<ReentryToken<'_>> {
        if self.0.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(ReentryToken(&self.0))
        }
    }
}

impl Default for ReentryFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases its [`ReentryFlag`] on drop.
#[derive(Debug)]
pub struct ReentryToken<'a>(&'a AtomicBool);

impl Drop for ReentryToken<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
