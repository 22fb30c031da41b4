//! Win32 host: the overlay window, its timers and the message loop.
//!
//! All overlay work happens on the thread that calls [`run`]. The tick timer
//! drives sample, layout, render and present; a second 100ms timer and
//! `WM_WINDOWPOSCHANGED` keep the window at the top of the topmost band.

use std::mem;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use crossbeam::channel::{bounded, Receiver};
use tracing::{debug, info, warn};
use tray_icon::menu::MenuEvent;
use tray_icon::{MouseButton, MouseButtonState, TrayIconEvent};
use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::HiDpi::{SetProcessDpiAwarenessContext, DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2};
use windows::Win32::UI::WindowsAndMessaging::*;

use super::mouse_hook::{install_mouse_hook, publish_bounds, uninstall_mouse_hook};
use super::tray::TrayIconManager;
use super::win32_shell::{set_topmost, Win32Shell};
use super::{WM_OVERLAY_POINTER, WM_OVERLAY_TRAY};
use crate::config::{ConfigWatcher, OverlayConfig};
use crate::input::{MenuCommand, OverlayAction, PointerEvent, ProcessLauncher};
use crate::metrics::Sampler;
use crate::overlay::Overlay;
use crate::shell::ReentryFlag;

const CLASS_NAME: PCWSTR = w!("TaskmonOverlayWindow");
const TICK_TIMER: usize = 1;
const Z_ORDER_TIMER: usize = 2;
const Z_ORDER_INTERVAL_MS: u32 = 100;
const DOUBLE_CLICK: Duration = Duration::from_millis(500);

/// Held while a handler has `&mut HostState`.
static HOST_STATE: ReentryFlag = ReentryFlag::new();
/// Held inside our own `SetWindowPos`, which re-enters the window procedure
/// with `WM_WINDOWPOSCHANGED`.
static Z_ORDER_GUARD: ReentryFlag = ReentryFlag::new();
/// Set for the duration of the modal context menu.
static MENU_OPEN: AtomicBool = AtomicBool::new(false);

enum ShellEvent {
    Menu(MenuEvent),
    Tray(TrayIconEvent),
}

/// Stored in GWLP_USERDATA for the window's lifetime.
struct HostState {
    overlay: Overlay<Win32Shell>,
    pointer_rx: Receiver<PointerEvent>,
    shell_rx: Receiver<ShellEvent>,
    tray: Option<TrayIconManager>,
    last_tray_click: Option<Instant>,
}

/// Create the overlay window and run the message loop until Quit.
pub fn run(config: OverlayConfig, sampler: Sampler, config_path: Option<PathBuf>) -> Result<()> {
    unsafe {
        // Physical pixels everywhere; taskbar rects must match our own
        if let Err(e) = SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2) {
            debug!("Per-monitor DPI awareness not applied: {}", e);
        }
    }

    let hwnd = create_window().context("Failed to create overlay window")?;
    let interval = config.interval();
    let colors = config.colors();

    let mut overlay = Overlay::new(Win32Shell::new(hwnd), sampler, config, Box::new(ProcessLauncher));
    if let Some(path) = config_path {
        overlay = overlay.with_watcher(ConfigWatcher::new(path));
    }

    let (pointer_tx, pointer_rx) = bounded(64);
    install_mouse_hook(pointer_tx, hwnd).context("Failed to hook pointer input")?;

    let (shell_tx, shell_rx) = bounded(64);
    let tray = match TrayIconManager::new(&colors) {
        Ok(tray) => Some(tray),
        Err(e) => {
            warn!("Continuing without tray icon: {}", e);
            None
        }
    };
    forward_shell_events(shell_tx, hwnd);

    let state = Box::new(HostState {
        overlay,
        pointer_rx,
        shell_rx,
        tray,
        last_tray_click: None,
    });

    unsafe {
        SetWindowLongPtrW(hwnd, GWLP_USERDATA, Box::into_raw(state) as isize);
        ShowWindow(hwnd, SW_SHOWNA);

        with_state(hwnd, |state| {
            state.overlay.on_shown();
            publish_bounds(state.overlay.hit_bounds());
        });

        SetTimer(hwnd, TICK_TIMER, interval.as_millis() as u32, None);
        SetTimer(hwnd, Z_ORDER_TIMER, Z_ORDER_INTERVAL_MS, None);
    }

    info!("Overlay running, sampling every {}ms", interval.as_millis());

    unsafe {
        let mut msg = MSG::default();
        loop {
            let ret = GetMessageW(&mut msg, HWND::default(), 0, 0);
            if ret.0 == 0 {
                info!("WM_QUIT received, exiting");
                return Ok(());
            }
            if ret.0 == -1 {
                bail!("GetMessageW failed");
            }
            TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
}

fn create_window() -> Result<HWND> {
    unsafe {
        let hinstance = GetModuleHandleW(None)?;

        let wc = WNDCLASSEXW {
            cbSize: mem::size_of::<WNDCLASSEXW>() as u32,
            lpfnWndProc: Some(wndproc),
            hInstance: hinstance.into(),
            hCursor: LoadCursorW(None, IDC_ARROW)?,
            lpszClassName: CLASS_NAME,
            ..Default::default()
        };

        if RegisterClassExW(&wc) == 0 {
            bail!("RegisterClassExW failed");
        }

        let hwnd = CreateWindowExW(
            WS_EX_LAYERED | WS_EX_TOPMOST | WS_EX_TOOLWINDOW | WS_EX_NOACTIVATE,
            CLASS_NAME,
            w!("taskmon"),
            WS_POPUP,
            0,
            0,
            1,
            1,
            HWND::default(),
            HMENU::default(),
            hinstance,
            None,
        );

        if hwnd == HWND::default() {
            return Err(anyhow!("CreateWindowExW returned a null window"));
        }
        Ok(hwnd)
    }
}

/// Route tray icon and tray menu callbacks into the message loop.
fn forward_shell_events(tx: crossbeam::channel::Sender<ShellEvent>, hwnd: HWND) {
    let raw = hwnd.0;

    let tray_tx = tx.clone();
    TrayIconEvent::set_event_handler(Some(move |event| {
        let _ = tray_tx.try_send(ShellEvent::Tray(event));
        unsafe {
            let _ = PostMessageW(HWND(raw), WM_OVERLAY_TRAY, WPARAM(0), LPARAM(0));
        }
    }));

    MenuEvent::set_event_handler(Some(move |event| {
        let _ = tx.try_send(ShellEvent::Menu(event));
        unsafe {
            let _ = PostMessageW(HWND(raw), WM_OVERLAY_TRAY, WPARAM(0), LPARAM(0));
        }
    }));
}

/// Run `f` with exclusive access to the window's state.
///
/// `None` when the state is gone or a handler further up the stack holds
/// it; the nested message is then handled without it.
unsafe fn with_state<R>(hwnd: HWND, f: impl FnOnce(&mut HostState) -> R) -> Option<R> {
    let ptr = GetWindowLongPtrW(hwnd, GWLP_USERDATA) as *mut HostState;
    if ptr.is_null() {
        return None;
    }
    let Some(_entered) = HOST_STATE.try_enter() else {
        debug!("Nested window message while host state is in use");
        return None;
    };
    Some(f(&mut *ptr))
}

unsafe extern "system" fn wndproc(hwnd: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    match msg {
        WM_TIMER => {
            with_state(hwnd, |state| match wparam.0 {
                TICK_TIMER => {
                    if let Some(interval) = state.overlay.tick() {
                        info!("Sample interval now {}ms", interval.as_millis());
                        SetTimer(hwnd, TICK_TIMER, interval.as_millis() as u32, None);
                    }
                    publish_bounds(state.overlay.hit_bounds());
                }
                Z_ORDER_TIMER => {
                    if let Some(_entered) = Z_ORDER_GUARD.try_enter() {
                        state.overlay.reassert_z_order();
                    }
                }
                _ => {}
            });
            LRESULT(0)
        }
        WM_WINDOWPOSCHANGED => {
            // Often sent from inside present(); works on the handle alone
            if !MENU_OPEN.load(Ordering::Acquire) {
                if let Some(_entered) = Z_ORDER_GUARD.try_enter() {
                    set_topmost(hwnd);
                }
            }
            DefWindowProcW(hwnd, msg, wparam, lparam)
        }
        WM_OVERLAY_POINTER => {
            on_pointer(hwnd);
            LRESULT(0)
        }
        WM_OVERLAY_TRAY => {
            on_shell_events(hwnd);
            LRESULT(0)
        }
        WM_DISPLAYCHANGE | WM_SETTINGCHANGE | WM_DPICHANGED => {
            with_state(hwnd, |state| {
                debug!("Display or shell settings changed; relayout");
                state.overlay.refresh();
                publish_bounds(state.overlay.hit_bounds());
            });
            LRESULT(0)
        }
        WM_MOUSEACTIVATE => LRESULT(MA_NOACTIVATE as isize),
        WM_CLOSE => {
            shutdown(hwnd);
            LRESULT(0)
        }
        WM_DESTROY => {
            PostQuitMessage(0);
            LRESULT(0)
        }
        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}

unsafe fn on_pointer(hwnd: HWND) {
    let menu_at = with_state(hwnd, |state| {
        let mut menu_at = None;
        while let Ok(event) = state.pointer_rx.try_recv() {
            if let OverlayAction::ShowMenu { x, y } = state.overlay.handle_pointer(&event) {
                menu_at = Some((x, y));
            }
        }
        if menu_at.is_some() {
            // The popup may overlap the overlay; stop swallowing clicks meanwhile
            state.overlay.begin_context_menu();
            publish_bounds(state.overlay.hit_bounds());
        }
        menu_at
    })
    .flatten();

    let Some((x, y)) = menu_at else {
        return;
    };

    // A topmost reassertion would lift the overlay over the bottom of the menu
    MENU_OPEN.store(true, Ordering::Release);
    let _ = KillTimer(hwnd, Z_ORDER_TIMER);
    let command = show_context_menu(hwnd, x, y);
    MENU_OPEN.store(false, Ordering::Release);

    let still_open = with_state(hwnd, |state| {
        state.overlay.end_context_menu();
        publish_bounds(state.overlay.hit_bounds());
    })
    .is_some();
    if !still_open {
        return;
    }

    SetTimer(hwnd, Z_ORDER_TIMER, Z_ORDER_INTERVAL_MS, None);
    if let Some(command) = command {
        run_menu_command(hwnd, command);
    }
}

unsafe fn on_shell_events(hwnd: HWND) {
    let commands = with_state(hwnd, |state| {
        let mut commands = Vec::new();
        while let Ok(event) = state.shell_rx.try_recv() {
            match event {
                ShellEvent::Menu(event) => {
                    if let Some(command) = state.tray.as_ref().and_then(|t| t.command_for(&event.id)) {
                        commands.push(command);
                    }
                }
                ShellEvent::Tray(TrayIconEvent::Click {
                    button: MouseButton::Left,
                    button_state: MouseButtonState::Up,
                    ..
                }) => {
                    let now = Instant::now();
                    let is_double_click = state
                        .last_tray_click
                        .is_some_and(|last| now.duration_since(last) < DOUBLE_CLICK);
                    if is_double_click {
                        state.last_tray_click = None;
                        commands.push(MenuCommand::OpenSettings);
                    } else {
                        state.last_tray_click = Some(now);
                    }
                }
                ShellEvent::Tray(_) => {}
            }
        }
        commands
    })
    .unwrap_or_default();

    for command in commands {
        run_menu_command(hwnd, command);
    }
}

unsafe fn run_menu_command(hwnd: HWND, command: MenuCommand) {
    info!("Menu: {}", command.title());
    if let Some(ControlFlow::Break(())) = with_state(hwnd, |state| state.overlay.handle_menu(command)) {
        let _ = PostMessageW(hwnd, WM_CLOSE, WPARAM(0), LPARAM(0));
    }
}

/// Modal popup menu at a screen point. Returns the chosen entry.
unsafe fn show_context_menu(hwnd: HWND, x: i32, y: i32) -> Option<MenuCommand> {
    let menu = match CreatePopupMenu() {
        Ok(menu) => menu,
        Err(e) => {
            warn!("Failed to create context menu: {}", e);
            return None;
        }
    };

    for command in MenuCommand::ALL {
        if command == MenuCommand::Quit {
            let _ = AppendMenuW(menu, MF_SEPARATOR, 0, PCWSTR::null());
        }
        let title: Vec<u16> = command.title().encode_utf16().chain(Some(0)).collect();
        let _ = AppendMenuW(menu, MF_STRING, command.id() as usize, PCWSTR(title.as_ptr()));
    }

    // Required for the menu to close when the user clicks elsewhere
    SetForegroundWindow(hwnd);
    let chosen = TrackPopupMenu(
        menu,
        TPM_RETURNCMD | TPM_RIGHTBUTTON | TPM_BOTTOMALIGN,
        x,
        y,
        0,
        hwnd,
        None,
    );
    let _ = PostMessageW(hwnd, WM_NULL, WPARAM(0), LPARAM(0));
    let _ = DestroyMenu(menu);

    MenuCommand::from_id(chosen.0 as u32)
}

/// Tear down in order: timers, hook, tray icon, surface, window.
unsafe fn shutdown(hwnd: HWND) {
    let Some(_entered) = HOST_STATE.try_enter() else {
        // Sent from inside another handler; retry from the message loop
        let _ = PostMessageW(hwnd, WM_CLOSE, WPARAM(0), LPARAM(0));
        return;
    };

    let _ = KillTimer(hwnd, TICK_TIMER);
    let _ = KillTimer(hwnd, Z_ORDER_TIMER);
    uninstall_mouse_hook();

    let ptr = GetWindowLongPtrW(hwnd, GWLP_USERDATA);
    if ptr != 0 {
        SetWindowLongPtrW(hwnd, GWLP_USERDATA, 0); // Clear pointer first
        let mut state = Box::from_raw(ptr as *mut HostState);
        drop(state.tray.take());
        state.overlay.shell_mut().release_surface();
        drop(state);
    }

    info!("Overlay shut down");
    let _ = DestroyWindow(hwnd);
}
