//! Overlay geometry: panel widths, hit-test sections and screen placement.
//!
//! Everything here is pure arithmetic over the config and whatever the shell
//! reported about the taskbar, so the same code drives rendering, pointer
//! hit-testing and window placement.

use crate::config::{CpuMode, OverlayConfig};

/// Width of every simple (sparkline) panel.
pub const PANEL_WIDTH: i32 = 70;
/// Per-core grid bar width and gap.
pub const CORE_BAR_WIDTH: i32 = 9;
pub const CORE_BAR_GAP: i32 = 2;
/// The per-core grid always has this many rows.
pub const CORE_ROWS: usize = 3;
/// Inner horizontal padding of a panel.
pub const PANEL_PADDING: i32 = 4;
pub const MIN_WIDTH: i32 = 60;
pub const MIN_HEIGHT: i32 = 32;

/// Screen rectangle in physical pixels, right/bottom exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self { left, top, right, bottom }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

/// Screen dimensions of the primary monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: i32,
    pub height: i32,
}

/// Panels in display order, left to right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Panel {
    NetUp,
    NetDown,
    Cpu,
    Gpu,
    Memory,
}

impl Panel {
    pub const ALL: [Panel; 5] = [Panel::NetUp, Panel::NetDown, Panel::Cpu, Panel::Gpu, Panel::Memory];

    pub fn label(self) -> &'static str {
        match self {
            Panel::NetUp => "UPLOAD",
            Panel::NetDown => "DOWNLOAD",
            Panel::Cpu => "CPU",
            Panel::Gpu => "GPU",
            Panel::Memory => "MEM",
        }
    }

    pub fn is_enabled(self, config: &OverlayConfig) -> bool {
        match self {
            Panel::NetUp => config.show_net_up,
            Panel::NetDown => config.show_net_down,
            Panel::Cpu => config.show_cpu,
            Panel::Gpu => config.show_gpu(),
            Panel::Memory => config.show_memory,
        }
    }
}

/// Horizontal slice of the overlay owned by one panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section {
    pub panel: Panel,
    pub x: i32,
    pub width: i32,
}

impl Section {
    pub fn end(&self) -> i32 {
        self.x + self.width
    }

    pub fn contains(&self, x: i32) -> bool {
        x >= self.x && x < self.end()
    }
}

/// Width of the per-core CPU grid for `cores` logical cores.
pub fn per_core_width(cores: usize) -> i32 {
    let columns = cores.max(1).div_ceil(CORE_ROWS) as i32;
    PANEL_PADDING + columns * (CORE_BAR_WIDTH + CORE_BAR_GAP) - CORE_BAR_GAP + PANEL_PADDING
}

/// Visible panels and their horizontal extents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelLayout {
    sections: Vec<Section>,
    content_width: i32,
}

impl PanelLayout {
    pub fn new(config: &OverlayConfig, core_count: usize) -> Self {
        let mut sections = Vec::with_capacity(Panel::ALL.len());
        let mut x = 0;

        for panel in Panel::ALL.into_iter().filter(|p| p.is_enabled(config)) {
            let width = match (panel, config.cpu_mode) {
                (Panel::Cpu, CpuMode::PerCore) => per_core_width(core_count),
                _ => PANEL_WIDTH,
            };
            sections.push(Section { panel, x, width });
            x += width;
        }

        Self {
            sections,
            content_width: x,
        }
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Sum of panel widths. Sections partition `[0, content_width)`.
    pub fn content_width(&self) -> i32 {
        self.content_width
    }

    /// Window width, never below [`MIN_WIDTH`].
    pub fn width(&self) -> i32 {
        self.content_width.max(MIN_WIDTH)
    }

    /// Section under overlay-relative `x`, if any.
    pub fn section_at(&self, x: i32) -> Option<&Section> {
        if x < 0 || x >= self.content_width {
            return None;
        }
        self.sections.iter().find(|s| s.contains(x))
    }
}

/// What the shell could find out about the taskbar this layout pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrayProbe {
    pub taskbar: Option<Rect>,
    pub notify_area: Option<Rect>,
    /// First overflow button inside the notification area (Windows 10).
    pub notify_chevron: Option<Rect>,
    /// Overflow buttons that are direct taskbar children (Windows 11).
    pub taskbar_buttons: Vec<Rect>,
}

/// X coordinate the overlay's right edge should touch.
///
/// The leftmost of the notification area and any overflow chevron left of
/// it, so the overlay never covers the "show hidden icons" button.
pub fn tray_left_edge(probe: &TrayProbe, screen_width: i32) -> i32 {
    let (Some(_), Some(notify)) = (probe.taskbar, probe.notify_area) else {
        return screen_width;
    };

    let mut left = notify.left;
    if let Some(chevron) = probe.notify_chevron {
        left = left.min(chevron.left);
    }
    for button in probe.taskbar_buttons.iter().filter(|b| b.left < notify.left) {
        left = left.min(button.left);
    }
    left
}

/// Window position and size in screen pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Geometry {
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

/// Place the overlay flush against the taskbar, left of the tray.
pub fn compute_geometry(layout: &PanelLayout, probe: &TrayProbe, screen: ScreenSize) -> Geometry {
    let width = layout.width();
    let height = probe
        .taskbar
        .map(|t| t.height().max(MIN_HEIGHT))
        .unwrap_or(MIN_HEIGHT);

    let x = tray_left_edge(probe, screen.width) - width;
    let y = probe.taskbar.map(|t| t.top).unwrap_or(screen.height - height);

    Geometry { x, y, width, height }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCREEN: ScreenSize = ScreenSize {
        width: 1920,
        height: 1080,
    };

    fn only(panel: Panel) -> OverlayConfig {
        OverlayConfig {
            show_net_up: panel == Panel::NetUp,
            show_net_down: panel == Panel::NetDown,
            show_cpu: panel == Panel::Cpu,
            show_gpu_util: panel == Panel::Gpu,
            show_gpu_temp: false,
            show_memory: panel == Panel::Memory,
            ..OverlayConfig::default()
        }
    }

    fn taskbar_probe() -> TrayProbe {
        TrayProbe {
            taskbar: Some(Rect::new(0, 1032, 1920, 1080)),
            notify_area: Some(Rect::new(1700, 1032, 1920, 1080)),
            notify_chevron: None,
            taskbar_buttons: Vec::new(),
        }
    }

    #[test]
    fn test_per_core_width() {
        assert_eq!(per_core_width(1), 4 + 11 - 2 + 4);
        assert_eq!(per_core_width(3), 17);
        assert_eq!(per_core_width(4), 4 + 2 * 11 - 2 + 4);
        for cores in 1..=128usize {
            let cols = ((cores + 2) / 3) as i32;
            assert_eq!(per_core_width(cores), 4 + cols * (9 + 2) - 2 + 4);
        }
    }

    #[test]
    fn test_only_memory() {
        let layout = PanelLayout::new(&only(Panel::Memory), 8);
        assert_eq!(layout.width(), 70);
        assert_eq!(layout.sections().len(), 1);
        assert_eq!(layout.sections()[0].panel, Panel::Memory);
    }

    #[test]
    fn test_nothing_visible_keeps_floor() {
        let config = OverlayConfig {
            show_net_up: false,
            show_net_down: false,
            show_cpu: false,
            show_gpu_util: false,
            show_gpu_temp: false,
            show_memory: false,
            ..OverlayConfig::default()
        };
        let layout = PanelLayout::new(&config, 8);
        assert_eq!(layout.width(), MIN_WIDTH);
        assert!(layout.section_at(0).is_none());
    }

    #[test]
    fn test_width_grows_as_panels_are_enabled() {
        let mut config = only(Panel::NetUp);
        let mut last = PanelLayout::new(&config, 16).width();
        for step in 0..5 {
            match step {
                0 => config.show_net_down = true,
                1 => config.show_cpu = true,
                2 => config.show_gpu_temp = true,
                3 => config.show_memory = true,
                _ => config.cpu_mode = CpuMode::PerCore,
            }
            let width = PanelLayout::new(&config, 16).width();
            assert!(width >= last, "step {step}: {width} < {last}");
            last = width;
        }
    }

    #[test]
    fn test_gpu_shown_for_temperature_only() {
        let config = OverlayConfig {
            show_gpu_util: false,
            show_gpu_temp: true,
            ..only(Panel::Memory)
        };
        let panels: Vec<Panel> = PanelLayout::new(&config, 4).sections().iter().map(|s| s.panel).collect();
        assert_eq!(panels, vec![Panel::Gpu, Panel::Memory]);
    }

    #[test]
    fn test_sections_partition_content() {
        let config = OverlayConfig {
            cpu_mode: CpuMode::PerCore,
            ..OverlayConfig::default()
        };
        let layout = PanelLayout::new(&config, 12);
        let mut expected_x = 0;
        for section in layout.sections() {
            assert_eq!(section.x, expected_x);
            expected_x = section.end();
        }
        assert_eq!(expected_x, layout.content_width());

        for x in 0..layout.content_width() {
            let hits = layout.sections().iter().filter(|s| s.contains(x)).count();
            assert_eq!(hits, 1, "x = {x}");
            assert!(layout.section_at(x).is_some());
        }
        assert!(layout.section_at(layout.content_width()).is_none());
        assert!(layout.section_at(-1).is_none());
    }

    #[test]
    fn test_tray_edge_falls_back_to_screen_width() {
        assert_eq!(tray_left_edge(&TrayProbe::default(), 1920), 1920);
        let probe = TrayProbe {
            notify_area: None,
            ..taskbar_probe()
        };
        assert_eq!(tray_left_edge(&probe, 2560), 2560);
    }

    #[test]
    fn test_tray_edge_takes_leftmost_chevron() {
        let mut probe = taskbar_probe();
        assert_eq!(tray_left_edge(&probe, 1920), 1700);

        probe.notify_chevron = Some(Rect::new(1710, 1032, 1730, 1080));
        assert_eq!(tray_left_edge(&probe, 1920), 1700);

        probe.taskbar_buttons = vec![
            Rect::new(10, 1032, 60, 1080),
            Rect::new(1676, 1032, 1700, 1080),
            Rect::new(1800, 1032, 1820, 1080),
        ];
        assert_eq!(tray_left_edge(&probe, 1920), 10);

        probe.taskbar_buttons.remove(0);
        assert_eq!(tray_left_edge(&probe, 1920), 1676);
    }

    #[test]
    fn test_geometry_sits_left_of_tray() {
        let layout = PanelLayout::new(&only(Panel::Cpu), 8);
        let geometry = compute_geometry(&layout, &taskbar_probe(), SCREEN);
        assert_eq!(
            geometry,
            Geometry {
                x: 1630,
                y: 1032,
                width: 70,
                height: 48
            }
        );
        assert!(geometry.contains(1630, 1032));
        assert!(!geometry.contains(1700, 1040));
    }

    #[test]
    fn test_geometry_without_taskbar() {
        let layout = PanelLayout::new(&only(Panel::Cpu), 8);
        let geometry = compute_geometry(&layout, &TrayProbe::default(), SCREEN);
        assert_eq!(geometry.height, MIN_HEIGHT);
        assert_eq!(geometry.y, 1080 - MIN_HEIGHT);
        assert_eq!(geometry.x, 1920 - 70);
    }

    #[test]
    fn test_thin_taskbar_uses_min_height() {
        let probe = TrayProbe {
            taskbar: Some(Rect::new(0, 1056, 1920, 1080)),
            ..taskbar_probe()
        };
        let layout = PanelLayout::new(&only(Panel::Cpu), 8);
        let geometry = compute_geometry(&layout, &probe, SCREEN);
        assert_eq!(geometry.height, MIN_HEIGHT);
        assert_eq!(geometry.y, 1056);
    }
}
