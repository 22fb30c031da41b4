//! The overlay engine: sample, lay out, render and present once per tick.
//!
//! `Overlay` is platform-free. The Win32 host drives it from its timers and
//! pointer hook; tests drive it with [`FixedShell`](crate::shell::FixedShell).

use std::ops::ControlFlow;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::compositor::{Compositor, Frame};
use crate::config::{ensure_config_file, ConfigWatcher, OverlayConfig};
use crate::input::{launch_best_effort, route, DiagnosticTool, MenuCommand, OverlayAction, PointerEvent, ToolLauncher};
use crate::layout::{compute_geometry, Geometry, PanelLayout};
use crate::metrics::Sampler;
use crate::shell::ShellIntegration;

pub struct Overlay<S: ShellIntegration> {
    shell: S,
    sampler: Sampler,
    compositor: Compositor,
    launcher: Box<dyn ToolLauncher>,
    config: OverlayConfig,
    watcher: Option<ConfigWatcher>,
    layout: PanelLayout,
    geometry: Geometry,
    menu_open: bool,
}

impl<S: ShellIntegration> Overlay<S> {
    pub fn new(shell: S, sampler: Sampler, config: OverlayConfig, launcher: Box<dyn ToolLauncher>) -> Self {
        let config = config.normalized();
        let layout = PanelLayout::new(&config, sampler.core_count());
        let geometry = compute_geometry(&layout, &shell.probe_tray(), shell.screen_size());

        Self {
            shell,
            sampler,
            compositor: Compositor::new(),
            launcher,
            config,
            watcher: None,
            layout,
            geometry,
            menu_open: false,
        }
    }

    /// Reload settings whenever the watched file changes.
    pub fn with_watcher(mut self, watcher: ConfigWatcher) -> Self {
        self.watcher = Some(watcher);
        self
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    pub fn layout(&self) -> &PanelLayout {
        &self.layout
    }

    /// Current screen bounds, as last computed.
    pub fn bounds(&self) -> Geometry {
        self.geometry
    }

    /// Area whose clicks the pointer hook swallows. Empty while a context
    /// menu is open so the menu gets its clicks.
    pub fn hit_bounds(&self) -> Geometry {
        if self.menu_open {
            Geometry::default()
        } else {
            self.geometry
        }
    }

    /// A modal context menu is about to open over the overlay.
    pub fn begin_context_menu(&mut self) {
        self.menu_open = true;
    }

    pub fn end_context_menu(&mut self) {
        self.menu_open = false;
    }

    pub fn shell(&self) -> &S {
        &self.shell
    }

    pub fn shell_mut(&mut self) -> &mut S {
        &mut self.shell
    }

    /// One timer tick.
    ///
    /// Returns the new sample interval when a settings reload changed it,
    /// so the host can reset its timer.
    pub fn tick(&mut self) -> Option<Duration> {
        let old_interval = self.config.interval();
        let reloaded = self.watcher.as_mut().and_then(ConfigWatcher::poll);
        let changed = reloaded.is_some_and(|config| self.set_config(config));

        self.sampler.sample();
        self.refresh();
        self.interval_change(changed, old_interval)
    }

    /// First paint after the window is shown.
    pub fn on_shown(&mut self) {
        self.refresh();
        self.shell.assert_topmost();
    }

    /// Z-order timer and position-change guard. Skipped while a context
    /// menu is open, which would otherwise end up underneath.
    pub fn reassert_z_order(&mut self) {
        if !self.menu_open {
            self.shell.assert_topmost();
        }
    }

    /// Swap in a new configuration and repaint.
    ///
    /// Returns the new interval if it differs from the old one.
    pub fn apply_config(&mut self, config: OverlayConfig) -> Option<Duration> {
        let old_interval = self.config.interval();
        let changed = self.set_config(config);
        if changed {
            self.refresh();
        }
        self.interval_change(changed, old_interval)
    }

    /// Store a new configuration without drawing. Returns whether anything
    /// changed.
    fn set_config(&mut self, config: OverlayConfig) -> bool {
        let config = config.normalized();
        if config == self.config {
            return false;
        }

        if !config.network_adapter.eq_ignore_ascii_case(&self.config.network_adapter) {
            info!(
                "Network adapter changed to '{}'; takes effect on next start",
                config.network_adapter
            );
        }

        self.config = config;
        info!("Settings applied");
        true
    }

    fn interval_change(&self, changed: bool, old_interval: Duration) -> Option<Duration> {
        let interval = self.config.interval();
        (changed && interval != old_interval).then_some(interval)
    }

    /// Layout pass, render and present. Failures are logged and the frame
    /// dropped; the next tick tries again.
    pub fn refresh(&mut self) {
        self.layout_pass();

        let frame = Frame {
            snapshot: self.sampler.snapshot(),
            history: self.sampler.history(),
            net_scale: self.sampler.net_scale(),
            config: &self.config,
            layout: &self.layout,
            height: self.geometry.height,
        };

        let surface = match self.compositor.render(frame) {
            Ok(surface) => surface,
            Err(e) => {
                warn!("Skipping frame: {}", e);
                return;
            }
        };

        if let Err(e) = self.shell.present(surface, self.geometry, self.config.global_alpha()) {
            warn!("{}", e);
        }
    }

    fn layout_pass(&mut self) {
        let layout = PanelLayout::new(&self.config, self.sampler.core_count());
        let geometry = compute_geometry(&layout, &self.shell.probe_tray(), self.shell.screen_size());

        if geometry != self.geometry {
            debug!(
                "Overlay moved to {}x{} at ({}, {})",
                geometry.width, geometry.height, geometry.x, geometry.y
            );
        }

        self.layout = layout;
        self.geometry = geometry;
    }

    /// Route a pointer event and perform click actions.
    ///
    /// `ShowMenu` is returned to the host, which owns native menus.
    pub fn handle_pointer(&mut self, event: &PointerEvent) -> OverlayAction {
        let action = route(event, &self.geometry, &self.layout);
        if let OverlayAction::LaunchTool { tool, panel } = action {
            debug!("{:?} panel clicked", panel);
            launch_best_effort(self.launcher.as_mut(), tool);
        }
        action
    }

    /// Execute a context or tray menu entry.
    pub fn handle_menu(&mut self, command: MenuCommand) -> ControlFlow<()> {
        match command {
            MenuCommand::OpenSettings => self.open_settings(),
            MenuCommand::OpenResourceMonitor => {
                launch_best_effort(self.launcher.as_mut(), DiagnosticTool::ResourceMonitor)
            }
            MenuCommand::OpenTaskManager => launch_best_effort(self.launcher.as_mut(), DiagnosticTool::TaskManager),
            MenuCommand::Quit => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    fn open_settings(&mut self) {
        let Some(path) = self.watcher.as_ref().map(|w| PathBuf::from(w.path())) else {
            warn!("No settings file location known");
            return;
        };

        if let Err(e) = ensure_config_file(&path) {
            warn!("{}", e);
            return;
        }
        if let Err(e) = self.launcher.open_path(&path) {
            warn!("Failed to open {}: {}", path.display(), e);
        }
    }
}
