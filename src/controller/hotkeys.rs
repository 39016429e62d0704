//! Reboot hotkey monitor.
//!
//! The monitor stays disarmed until no button has been held for the
//! activation time, so buttons still held while the device powers up can
//! never trigger a reboot. Once armed it stays armed. Holding exactly one of
//! the configured combinations for the hold time emits a single reboot
//! request.

use crate::controller::boot::{BootMode, RunMode};
use crate::controller::input_snapshot::{Buttons, InputSnapshot};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

pub const DEFAULT_ACTIVATION_TIME: Duration = Duration::from_millis(50);
pub const DEFAULT_HOLD_TIME: Duration = Duration::from_millis(4000);

/// Hotkey combinations understood by the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyCombo {
    /// Toggles between gamepad and web-config mode
    WebConfig,
    /// Reboots into the USB bootloader
    Bootsel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotkeySettings {
    pub activation_time: Duration,
    pub hold_time: Duration,
    pub webconfig_mask: Buttons,
    pub bootsel_mask: Buttons,
}

impl Default for HotkeySettings {
    fn default() -> Self {
        Self {
            activation_time: DEFAULT_ACTIVATION_TIME,
            hold_time: DEFAULT_HOLD_TIME,
            webconfig_mask: Buttons::S2 | Buttons::B3 | Buttons::B4,
            bootsel_mask: Buttons::S1 | Buttons::B3 | Buttons::B4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorPhase {
    /// Waiting for a continuous idle period; `idle_since` is empty while any
    /// button is held.
    Disarmed { idle_since: Option<Instant> },
    /// Evaluating combinations; `hold` is the combo being held and when it
    /// started.
    Armed {
        hold: Option<(HotkeyCombo, Instant)>,
    },
    /// A reboot request has been emitted.
    Triggered,
}

#[derive(Debug, Clone)]
pub struct RebootHotkeyMonitor {
    settings: HotkeySettings,
    phase: MonitorPhase,
}

impl RebootHotkeyMonitor {
    pub fn new(settings: HotkeySettings) -> Self {
        Self {
            settings,
            phase: MonitorPhase::Disarmed { idle_since: None },
        }
    }

    pub fn phase(&self) -> MonitorPhase {
        self.phase
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.phase, MonitorPhase::Armed { .. })
    }

    fn combo_for(&self, buttons: Buttons) -> Option<HotkeyCombo> {
        if buttons == self.settings.webconfig_mask {
            Some(HotkeyCombo::WebConfig)
        } else if buttons == self.settings.bootsel_mask {
            Some(HotkeyCombo::Bootsel)
        } else {
            None
        }
    }

    /// Advances the monitor with the tick's input.
    ///
    /// Returns the mode to reboot into once a combination has been held long
    /// enough. `current` decides where the web-config combination leads.
    pub fn process(
        &mut self,
        input: &InputSnapshot,
        current: RunMode,
        now: Instant,
    ) -> Option<BootMode> {
        let buttons = input.buttons;
        match self.phase {
            MonitorPhase::Disarmed { idle_since } => {
                if !buttons.is_empty() {
                    self.phase = MonitorPhase::Disarmed { idle_since: None };
                    return None;
                }

                let since = idle_since.unwrap_or(now);
                if now.saturating_duration_since(since) >= self.settings.activation_time {
                    debug!(
                        "No buttons held for {:?}, reboot hotkeys armed",
                        self.settings.activation_time
                    );
                    self.phase = MonitorPhase::Armed { hold: None };
                } else {
                    self.phase = MonitorPhase::Disarmed {
                        idle_since: Some(since),
                    };
                }
                None
            }
            MonitorPhase::Armed { hold } => {
                let Some(combo) = self.combo_for(buttons) else {
                    if hold.is_some() {
                        debug!("Hotkey released before hold time, hold cancelled");
                    }
                    self.phase = MonitorPhase::Armed { hold: None };
                    return None;
                };

                let started = match hold {
                    Some((held, started)) if held == combo => started,
                    _ => {
                        debug!("Hotkey {:?} pressed, hold timer started", combo);
                        now
                    }
                };

                if now.saturating_duration_since(started) < self.settings.hold_time {
                    self.phase = MonitorPhase::Armed {
                        hold: Some((combo, started)),
                    };
                    return None;
                }

                let target = match combo {
                    HotkeyCombo::WebConfig => match current {
                        RunMode::Gamepad => BootMode::WebConfig,
                        RunMode::WebConfig => BootMode::Gamepad,
                    },
                    HotkeyCombo::Bootsel => BootMode::Usb,
                };
                info!(
                    "Hotkey {:?} held for {:?}, requesting reboot into {:?}",
                    combo, self.settings.hold_time, target
                );
                self.phase = MonitorPhase::Triggered;
                Some(target)
            }
            MonitorPhase::Triggered => None,
        }
    }
}
