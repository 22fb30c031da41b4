//! [`ShellIntegration`] over a layered, topmost Win32 window.

use std::mem;
use std::ptr::null_mut;

use tiny_skia::Pixmap;
use tracing::{debug, warn};
use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::{COLORREF, HWND, POINT, RECT, SIZE};
use windows::Win32::Graphics::Gdi::{
    CreateCompatibleDC, CreateDIBSection, DeleteDC, DeleteObject, GetDC, ReleaseDC, SelectObject, AC_SRC_ALPHA,
    AC_SRC_OVER, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, BLENDFUNCTION, DIB_RGB_COLORS, HBITMAP, HDC, HGDIOBJ, RGBQUAD,
};
use windows::Win32::UI::WindowsAndMessaging::{
    FindWindowExW, FindWindowW, GetSystemMetrics, GetWindowRect, SetWindowPos, UpdateLayeredWindow, HWND_TOPMOST,
    SM_CXSCREEN, SM_CYSCREEN, SWP_NOACTIVATE, SWP_NOMOVE, SWP_NOSIZE, ULW_ALPHA,
};

use crate::compositor::copy_to_bgra;
use crate::error::OverlayError;
use crate::layout::{Geometry, Rect, ScreenSize, TrayProbe};
use crate::shell::ShellIntegration;

/// Top-down 32bpp DIB selected into a memory DC, reused while the size holds.
struct DibSurface {
    dc: HDC,
    bitmap: HBITMAP,
    previous: HGDIOBJ,
    bits: *mut u8,
    width: u32,
    height: u32,
}

impl DibSurface {
    fn new(width: u32, height: u32) -> Result<Self, OverlayError> {
        unsafe {
            let screen_dc = GetDC(None);
            let dc = CreateCompatibleDC(screen_dc);
            ReleaseDC(None, screen_dc);
            if dc.0 == 0 {
                return Err(OverlayError::SurfaceAllocation { width, height });
            }

            let bmi = BITMAPINFO {
                bmiHeader: BITMAPINFOHEADER {
                    biSize: mem::size_of::<BITMAPINFOHEADER>() as u32,
                    biWidth: width as i32,
                    biHeight: -(height as i32), // Top-down
                    biPlanes: 1,
                    biBitCount: 32,
                    biCompression: BI_RGB.0 as u32,
                    ..Default::default()
                },
                bmiColors: [RGBQUAD::default()],
            };

            let mut bits: *mut core::ffi::c_void = null_mut();
            let bitmap = match CreateDIBSection(dc, &bmi, DIB_RGB_COLORS, &mut bits, None, 0) {
                Ok(bitmap) if !bits.is_null() => bitmap,
                Ok(bitmap) => {
                    let _ = DeleteObject(bitmap);
                    let _ = DeleteDC(dc);
                    return Err(OverlayError::SurfaceAllocation { width, height });
                }
                Err(e) => {
                    let _ = DeleteDC(dc);
                    debug!("CreateDIBSection failed: {}", e);
                    return Err(OverlayError::SurfaceAllocation { width, height });
                }
            };
            let previous = SelectObject(dc, bitmap);

            Ok(Self {
                dc,
                bitmap,
                previous,
                bits: bits as *mut u8,
                width,
                height,
            })
        }
    }

    fn pixels_mut(&mut self) -> &mut [u8] {
        let len = self.width as usize * self.height as usize * 4;
        // The DIB stays selected and alive for as long as self
        unsafe { std::slice::from_raw_parts_mut(self.bits, len) }
    }
}

impl Drop for DibSurface {
    fn drop(&mut self) {
        unsafe {
            SelectObject(self.dc, self.previous);
            let _ = DeleteObject(self.bitmap);
            let _ = DeleteDC(self.dc);
        }
    }
}

/// Shell access for the overlay window.
pub struct Win32Shell {
    hwnd: HWND,
    surface: Option<DibSurface>,
}

impl Win32Shell {
    pub fn new(hwnd: HWND) -> Self {
        Self { hwnd, surface: None }
    }

    /// Drop the DIB and its memory DC.
    pub fn release_surface(&mut self) {
        self.surface = None;
    }
}

fn window_rect(hwnd: HWND) -> Option<Rect> {
    if hwnd == HWND::default() {
        return None;
    }
    let mut rect = RECT::default();
    unsafe { GetWindowRect(hwnd, &mut rect) }.ok()?;
    Some(Rect::new(rect.left, rect.top, rect.right, rect.bottom))
}

fn find_child(parent: HWND, after: HWND, class: PCWSTR) -> HWND {
    unsafe { FindWindowExW(parent, after, class, PCWSTR::null()) }
}

impl ShellIntegration for Win32Shell {
    fn probe_tray(&self) -> TrayProbe {
        let taskbar_hwnd = unsafe { FindWindowW(w!("Shell_TrayWnd"), PCWSTR::null()) };
        let Some(taskbar) = window_rect(taskbar_hwnd) else {
            return TrayProbe::default();
        };

        let notify_hwnd = find_child(taskbar_hwnd, HWND::default(), w!("TrayNotifyWnd"));
        let notify_area = window_rect(notify_hwnd);
        // Windows 10 keeps the chevron inside the notification area
        let notify_chevron = if notify_hwnd == HWND::default() {
            None
        } else {
            window_rect(find_child(notify_hwnd, HWND::default(), w!("Button")))
        };

        // Windows 11 parents it to the taskbar itself
        let mut taskbar_buttons = Vec::new();
        let mut child = find_child(taskbar_hwnd, HWND::default(), w!("Button"));
        while child != HWND::default() {
            if let Some(rect) = window_rect(child) {
                taskbar_buttons.push(rect);
            }
            child = find_child(taskbar_hwnd, child, w!("Button"));
        }

        TrayProbe {
            taskbar: Some(taskbar),
            notify_area,
            notify_chevron,
            taskbar_buttons,
        }
    }

    fn screen_size(&self) -> ScreenSize {
        unsafe {
            ScreenSize {
                width: GetSystemMetrics(SM_CXSCREEN),
                height: GetSystemMetrics(SM_CYSCREEN),
            }
        }
    }

    fn present(&mut self, surface: &Pixmap, geometry: Geometry, alpha: u8) -> Result<(), OverlayError> {
        let (width, height) = (surface.width(), surface.height());

        let stale = self
            .surface
            .as_ref()
            .map_or(true, |dib| dib.width != width || dib.height != height);
        if stale {
            self.surface = None;
            self.surface = Some(DibSurface::new(width, height)?);
        }
        let Some(dib) = self.surface.as_mut() else {
            return Err(OverlayError::SurfaceAllocation { width, height });
        };

        copy_to_bgra(surface, dib.pixels_mut());

        let blend = BLENDFUNCTION {
            BlendOp: AC_SRC_OVER as u8,
            BlendFlags: 0,
            SourceConstantAlpha: alpha,
            AlphaFormat: AC_SRC_ALPHA as u8,
        };
        let position = POINT {
            x: geometry.x,
            y: geometry.y,
        };
        let size = SIZE {
            cx: width as i32,
            cy: height as i32,
        };
        let source = POINT { x: 0, y: 0 };

        unsafe {
            let screen_dc = GetDC(None);
            let result = UpdateLayeredWindow(
                self.hwnd,
                screen_dc,
                Some(&position),
                Some(&size),
                dib.dc,
                Some(&source),
                COLORREF(0),
                Some(&blend),
                ULW_ALPHA,
            );
            ReleaseDC(None, screen_dc);
            result.map_err(|e| OverlayError::Present(e.to_string()))
        }
    }

    fn assert_topmost(&mut self) {
        set_topmost(self.hwnd);
    }
}

/// Move `hwnd` to the top of the topmost band without activating it.
pub(super) fn set_topmost(hwnd: HWND) {
    let result = unsafe {
        SetWindowPos(
            hwnd,
            HWND_TOPMOST,
            0,
            0,
            0,
            0,
            SWP_NOMOVE | SWP_NOSIZE | SWP_NOACTIVATE,
        )
    };
    if let Err(e) = result {
        warn!("Failed to re-assert topmost: {}", e);
    }
}
