//! Boot action resolution.
//!
//! Decided exactly once before the control loop starts, from the persisted
//! boot mode and, for a default boot, one raw (undebounced) input sample.

use crate::controller::input_snapshot::{Buttons, Dpad, InputSnapshot};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use tracing::{debug, info};

/// Boot mode persisted across a reboot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BootMode {
    #[default]
    Default,
    Gamepad,
    WebConfig,
    Usb,
}

/// Mode the control loop is serving in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunMode {
    Gamepad,
    WebConfig,
}

/// Report protocol presented to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum InputMode {
    Hid,
    Switch,
    #[default]
    XInput,
    Ps4,
    Keyboard,
    Serial,
}

impl Display for InputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputMode::Hid => write!(f, "HID"),
            InputMode::Switch => write!(f, "Switch"),
            InputMode::XInput => write!(f, "XInput"),
            InputMode::Ps4 => write!(f, "PS4"),
            InputMode::Keyboard => write!(f, "Keyboard"),
            InputMode::Serial => write!(f, "Serial"),
        }
    }
}

/// Persisted policy restricting what a boot-time button press may change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ForcedSetupOptions {
    #[default]
    Unlocked,
    LockModeSwitch,
    LockWebConfig,
    LockBoth,
}

impl ForcedSetupOptions {
    pub fn mode_switch_locked(self) -> bool {
        matches!(self, Self::LockModeSwitch | Self::LockBoth)
    }

    pub fn web_config_locked(self) -> bool {
        matches!(self, Self::LockWebConfig | Self::LockBoth)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BootAction {
    None,
    EnterWebConfigMode,
    EnterUsbMode,
    SetInputMode(InputMode),
}

/// Resolves the boot action.
///
/// `sample` is called at most once, and only for [`BootMode::Default`].
pub fn resolve_boot_action(
    mode: BootMode,
    forced: ForcedSetupOptions,
    sample: impl FnOnce() -> InputSnapshot,
) -> BootAction {
    let action = match mode {
        BootMode::Gamepad => BootAction::None,
        BootMode::WebConfig => BootAction::EnterWebConfigMode,
        BootMode::Usb => BootAction::EnterUsbMode,
        BootMode::Default => {
            let raw = sample();
            debug!("Boot sample: buttons={:?} dpad={:?}", raw.buttons, raw.dpad);
            resolve_from_input(&raw, forced)
        }
    };
    info!("Boot mode {:?} with {:?} resolved to {:?}", mode, forced, action);
    action
}

fn resolve_from_input(raw: &InputSnapshot, forced: ForcedSetupOptions) -> BootAction {
    let mode_switch = !forced.mode_switch_locked();

    if raw.pressed(Buttons::S1 | Buttons::S2) && raw.pressed_dpad(Dpad::UP) {
        BootAction::EnterUsbMode
    } else if !forced.web_config_locked() && raw.pressed(Buttons::S2) {
        BootAction::EnterWebConfigMode
    } else if mode_switch && raw.pressed(Buttons::B3) {
        BootAction::SetInputMode(InputMode::Hid)
    } else if mode_switch && raw.pressed(Buttons::B4) {
        BootAction::SetInputMode(InputMode::Ps4)
    } else if mode_switch && raw.pressed(Buttons::L1) {
        // Aliases the B4 target, Serial has no boot shortcut
        BootAction::SetInputMode(InputMode::Ps4)
    } else if mode_switch && raw.pressed(Buttons::B1) {
        BootAction::SetInputMode(InputMode::Switch)
    } else if mode_switch && raw.pressed(Buttons::B2) {
        BootAction::SetInputMode(InputMode::XInput)
    } else if mode_switch && raw.pressed(Buttons::R2) {
        BootAction::SetInputMode(InputMode::Keyboard)
    } else {
        BootAction::None
    }
}
