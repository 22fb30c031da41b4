/// Notification-area icon with the same menu as the overlay.
///
/// The icon is drawn at startup from the configured metric colours, so
/// there is no icon file to ship or locate.
use anyhow::{anyhow, Result};
use tray_icon::menu::{Menu, MenuId, MenuItem, PredefinedMenuItem};
use tray_icon::{Icon, TrayIcon, TrayIconBuilder};

use crate::config::{PanelColors, Rgba};
use crate::input::MenuCommand;

const ICON_SIZE: u32 = 16;

/// Four vertical bars (network, CPU, GPU, memory) on a transparent field.
fn build_icon(colors: &PanelColors) -> Result<Icon> {
    let bars: [(Rgba, u32); 4] = [
        (colors.net_down, 9),
        (colors.cpu, 13),
        (colors.gpu, 6),
        (colors.memory, 11),
    ];

    let img = image::RgbaImage::from_fn(ICON_SIZE, ICON_SIZE, |x, y| {
        // 3px bars with a 1px gap, 1px margin each side
        let slot = x.saturating_sub(1) / 4;
        let in_bar = x >= 1 && (x - 1) % 4 < 3 && slot < 4;
        match bars.get(slot as usize) {
            Some((color, height)) if in_bar && y >= ICON_SIZE - 1 - height && y < ICON_SIZE - 1 => {
                image::Rgba([color.r, color.g, color.b, 255])
            }
            _ => image::Rgba([0, 0, 0, 0]),
        }
    });

    Icon::from_rgba(img.into_raw(), ICON_SIZE, ICON_SIZE)
        .map_err(|e| anyhow!("Failed to create tray icon image: {:?}", e))
}

pub struct TrayIconManager {
    #[allow(dead_code)]
    tray_icon: TrayIcon,
    menu_ids: Vec<(MenuId, MenuCommand)>,
}

impl TrayIconManager {
    pub fn new(colors: &PanelColors) -> Result<Self> {
        tracing::info!("Creating tray icon");

        let icon = build_icon(colors)?;

        // Create context menu (appears on right-click)
        let menu = Menu::new();
        let mut menu_ids = Vec::with_capacity(MenuCommand::ALL.len());
        for command in MenuCommand::ALL {
            if command == MenuCommand::Quit {
                menu.append(&PredefinedMenuItem::separator())
                    .map_err(|e| anyhow!("Failed to add separator: {}", e))?;
            }
            let item = MenuItem::new(command.title(), true, None);
            menu.append(&item)
                .map_err(|e| anyhow!("Failed to add '{}' item: {}", command.title(), e))?;
            menu_ids.push((item.id().clone(), command));
        }

        let tray_icon = TrayIconBuilder::new()
            .with_tooltip("taskmon")
            .with_icon(icon)
            .with_menu(Box::new(menu))
            .build()
            .map_err(|e| anyhow!("Failed to create tray icon: {}", e))?;

        tracing::info!("Tray icon created successfully with context menu");

        Ok(Self { tray_icon, menu_ids })
    }

    /// Map a tray menu event id back to its command.
    pub fn command_for(&self, id: &MenuId) -> Option<MenuCommand> {
        self.menu_ids
            .iter()
            .find(|(menu_id, _)| menu_id == id)
            .map(|(_, command)| *command)
    }
}
