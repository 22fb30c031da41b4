//! Pointer routing: turns raw screen-space button events into overlay actions.

use std::io;
use std::path::Path;
use std::process::Command;

use tracing::{debug, warn};

use crate::layout::{Geometry, Panel, PanelLayout};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Left,
    Right,
    Middle,
}

/// A button transition in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerEvent {
    pub x: i32,
    pub y: i32,
    pub button: PointerButton,
    pub pressed: bool,
}

/// External diagnostic tools reachable from the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticTool {
    ResourceMonitor,
    TaskManager,
}

impl DiagnosticTool {
    pub fn executable(self) -> &'static str {
        match self {
            DiagnosticTool::ResourceMonitor => "resmon.exe",
            DiagnosticTool::TaskManager => "taskmgr.exe",
        }
    }
}

/// Starts diagnostic tools. Callers treat every failure as non-fatal.
pub trait ToolLauncher {
    fn launch(&mut self, tool: DiagnosticTool) -> io::Result<()>;

    /// Open a file with its default application.
    fn open_path(&mut self, path: &Path) -> io::Result<()>;
}

/// Spawns the tool as a detached child process.
#[derive(Debug, Default)]
pub struct ProcessLauncher;

impl ToolLauncher for ProcessLauncher {
    fn launch(&mut self, tool: DiagnosticTool) -> io::Result<()> {
        let child = Command::new(tool.executable()).spawn()?;
        debug!("Launched {} (pid {})", tool.executable(), child.id());
        Ok(())
    }

    fn open_path(&mut self, path: &Path) -> io::Result<()> {
        open::that(path)
    }
}

/// Launch `tool`, logging instead of failing.
pub fn launch_best_effort(launcher: &mut dyn ToolLauncher, tool: DiagnosticTool) {
    if let Err(e) = launcher.launch(tool) {
        warn!("Failed to launch {}: {}", tool.executable(), e);
    }
}

/// Entries of the overlay and tray context menus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuCommand {
    OpenSettings,
    OpenResourceMonitor,
    OpenTaskManager,
    Quit,
}

impl MenuCommand {
    pub const ALL: [MenuCommand; 4] = [
        MenuCommand::OpenSettings,
        MenuCommand::OpenResourceMonitor,
        MenuCommand::OpenTaskManager,
        MenuCommand::Quit,
    ];

    pub fn title(self) -> &'static str {
        match self {
            MenuCommand::OpenSettings => "Settings\u{2026}",
            MenuCommand::OpenResourceMonitor => "Open Resource Monitor",
            MenuCommand::OpenTaskManager => "Open Task Manager",
            MenuCommand::Quit => "Quit",
        }
    }

    /// Stable numeric id for native menus.
    pub fn id(self) -> u32 {
        match self {
            MenuCommand::OpenSettings => 1,
            MenuCommand::OpenResourceMonitor => 2,
            MenuCommand::OpenTaskManager => 3,
            MenuCommand::Quit => 4,
        }
    }

    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.id() == id)
    }
}

/// What the overlay does with a pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayAction {
    /// Outside the overlay; let it through.
    Pass,
    /// Inside the overlay, swallowed without further effect.
    Consume,
    /// Left click on a panel.
    LaunchTool { tool: DiagnosticTool, panel: Panel },
    /// Right click: open the context menu at this screen point.
    ShowMenu { x: i32, y: i32 },
}

impl OverlayAction {
    /// Whether the event must be kept from the windows underneath.
    pub fn consumes(self) -> bool {
        !matches!(self, OverlayAction::Pass)
    }
}

/// Decide what a pointer event means for an overlay at `geometry`.
///
/// Every button event inside the bounds is consumed, whatever the pixel
/// alpha underneath. Only button presses trigger actions.
pub fn route(event: &PointerEvent, geometry: &Geometry, layout: &PanelLayout) -> OverlayAction {
    if !geometry.contains(event.x, event.y) {
        return OverlayAction::Pass;
    }
    if !event.pressed {
        return OverlayAction::Consume;
    }

    match event.button {
        PointerButton::Left => match layout.section_at(event.x - geometry.x) {
            Some(section) => OverlayAction::LaunchTool {
                tool: DiagnosticTool::ResourceMonitor,
                panel: section.panel,
            },
            None => OverlayAction::Consume,
        },
        PointerButton::Right => OverlayAction::ShowMenu {
            x: event.x,
            y: event.y,
        },
        PointerButton::Middle => OverlayAction::Consume,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CpuMode, OverlayConfig};

    const GEOMETRY: Geometry = Geometry {
        x: 1000,
        y: 1032,
        width: 350,
        height: 48,
    };

    fn press(x: i32, y: i32, button: PointerButton) -> PointerEvent {
        PointerEvent {
            x,
            y,
            button,
            pressed: true,
        }
    }

    #[test]
    fn test_outside_passes_through() {
        let layout = PanelLayout::new(&OverlayConfig::default(), 8);
        for (x, y) in [(999, 1040), (1350, 1040), (1100, 1031), (1100, 1080)] {
            assert_eq!(route(&press(x, y, PointerButton::Left), &GEOMETRY, &layout), OverlayAction::Pass);
        }
    }

    #[test]
    fn test_left_click_launches_resource_monitor_for_hit_panel() {
        let layout = PanelLayout::new(&OverlayConfig::default(), 8);
        let action = route(&press(1000 + 150, 1040, PointerButton::Left), &GEOMETRY, &layout);
        assert_eq!(
            action,
            OverlayAction::LaunchTool {
                tool: DiagnosticTool::ResourceMonitor,
                panel: Panel::Cpu
            }
        );
    }

    #[test]
    fn test_right_click_opens_menu_at_pointer() {
        let layout = PanelLayout::new(&OverlayConfig::default(), 8);
        let action = route(&press(1010, 1050, PointerButton::Right), &GEOMETRY, &layout);
        assert_eq!(action, OverlayAction::ShowMenu { x: 1010, y: 1050 });
    }

    #[test]
    fn test_release_and_middle_are_consumed() {
        let layout = PanelLayout::new(&OverlayConfig::default(), 8);
        let mut release = press(1010, 1050, PointerButton::Left);
        release.pressed = false;
        assert_eq!(route(&release, &GEOMETRY, &layout), OverlayAction::Consume);
        assert_eq!(
            route(&press(1010, 1050, PointerButton::Middle), &GEOMETRY, &layout),
            OverlayAction::Consume
        );
    }

    #[test]
    fn test_click_in_padding_beyond_panels_is_consumed() {
        // Per-core grid for 2 cores is narrower than the window floor
        let config = OverlayConfig {
            show_net_up: false,
            show_net_down: false,
            show_gpu_util: false,
            show_gpu_temp: false,
            show_memory: false,
            cpu_mode: CpuMode::PerCore,
            ..OverlayConfig::default()
        };
        let layout = PanelLayout::new(&config, 2);
        let geometry = Geometry {
            width: layout.width(),
            ..GEOMETRY
        };
        let action = route(&press(1000 + 50, 1040, PointerButton::Left), &geometry, &layout);
        assert_eq!(action, OverlayAction::Consume);
        assert!(action.consumes());
    }

    #[test]
    fn test_menu_ids_round_trip() {
        for command in MenuCommand::ALL {
            assert_eq!(MenuCommand::from_id(command.id()), Some(command));
        }
        assert_eq!(MenuCommand::from_id(0), None);
    }
}
