/// Menu bar status item for the agent.
///
/// This module only draws: icon, "ON"/"OFF" title and the three menu items.
/// Clicks are turned into [`Intent`]s and handed to the dispatcher, which
/// calls back through [`StatusView`] once the intent has been applied.
use tray_icon::menu::{Menu, MenuId, MenuItem, PredefinedMenuItem};
use tray_icon::{Icon, TrayIcon, TrayIconBuilder};

use crate::assertion::AssertionState;
use crate::dispatcher::{startup_label, toggle_label, Intent, StatusView};
use crate::error::{Result, VigiloError};
use crate::startup::StartupRegistration;

const ENABLED_ICON: &[u8] = include_bytes!("../resources/on.png");
const DISABLED_ICON: &[u8] = include_bytes!("../resources/off.png");

/// Decode an embedded PNG into a tray icon
fn load_icon(png: &[u8]) -> Result<Icon> {
    let img = image::load_from_memory(png)
        .map_err(|e| VigiloError::Tray(format!("Failed to decode icon: {}", e)))?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();

    Icon::from_rgba(rgba.into_raw(), width, height)
        .map_err(|e| VigiloError::Tray(format!("Failed to create icon from image: {:?}", e)))
}

/// Menu bar item with its context menu
pub struct TrayManager {
    tray_icon: TrayIcon,
    enabled_icon: Icon,
    disabled_icon: Icon,
    toggle_item: MenuItem,
    startup_item: MenuItem,
    pub menu_item_toggle: MenuId,
    pub menu_item_startup: MenuId,
    pub menu_item_quit: MenuId,
}

impl TrayManager {
    /// Create the status item. Must run after the event loop has started.
    pub fn new() -> Result<Self> {
        tracing::info!("Creating tray icon");

        let enabled_icon = load_icon(ENABLED_ICON)?;
        let disabled_icon = load_icon(DISABLED_ICON)?;
        tracing::debug!("Icons loaded");

        let menu = Menu::new();
        let toggle_item = MenuItem::new(toggle_label(AssertionState::Disabled), true, None);
        let startup_item =
            MenuItem::new(startup_label(StartupRegistration::Unregistered), true, None);
        let separator = PredefinedMenuItem::separator();
        let quit_item = MenuItem::new("Quit", true, None);

        menu.append(&toggle_item)
            .map_err(|e| VigiloError::Tray(format!("Failed to add toggle item: {}", e)))?;
        menu.append(&startup_item)
            .map_err(|e| VigiloError::Tray(format!("Failed to add startup item: {}", e)))?;
        menu.append(&separator)
            .map_err(|e| VigiloError::Tray(format!("Failed to add separator: {}", e)))?;
        menu.append(&quit_item)
            .map_err(|e| VigiloError::Tray(format!("Failed to add quit item: {}", e)))?;

        // Store menu IDs for event handling
        let menu_item_toggle = toggle_item.id().clone();
        let menu_item_startup = startup_item.id().clone();
        let menu_item_quit = quit_item.id().clone();

        let tray_icon = TrayIconBuilder::new()
            .with_tooltip("Vigilo")
            .with_title(AssertionState::Disabled.title())
            .with_icon(disabled_icon.clone())
            .with_menu(Box::new(menu))
            .build()
            .map_err(|e| VigiloError::Tray(format!("Failed to create tray icon: {}", e)))?;

        tracing::info!("Tray icon created successfully with context menu");

        Ok(Self {
            tray_icon,
            enabled_icon,
            disabled_icon,
            toggle_item,
            startup_item,
            menu_item_toggle,
            menu_item_startup,
            menu_item_quit,
        })
    }

    /// Map a clicked menu item to the intent it stands for
    pub fn intent_for(&self, id: &MenuId) -> Option<Intent> {
        if *id == self.menu_item_toggle {
            Some(Intent::ToggleAssertion)
        } else if *id == self.menu_item_startup {
            Some(Intent::ToggleStartup)
        } else if *id == self.menu_item_quit {
            Some(Intent::Quit)
        } else {
            None
        }
    }
}

impl StatusView for TrayManager {
    fn show_assertion_state(&mut self, state: AssertionState) {
        let icon = match state {
            AssertionState::Enabled => self.enabled_icon.clone(),
            AssertionState::Disabled => self.disabled_icon.clone(),
        };
        if let Err(e) = self.tray_icon.set_icon(Some(icon)) {
            tracing::warn!("Failed to update tray icon: {}", e);
        }
        self.tray_icon.set_title(Some(state.title()));
        self.toggle_item.set_text(toggle_label(state));
    }

    fn show_startup(&mut self, registration: StartupRegistration) {
        self.startup_item.set_text(startup_label(registration));
    }
}
