//! # Persistence
//!
//! Storage collaborator seen by the control core: the persisted boot mode,
//! the forced-setup policy, gamepad options, and a save queue that any
//! context may feed while only the control loop drains it.
//!
//! ## Error Handling Strategy
//! Missing or unreadable settings degrade to defaults at load time. A failed
//! save is never fatal: the delta stays queued and is retried on the next
//! drain, so the control loop never stalls on the backend.

pub mod save_queue;
pub mod settings_store;

pub use save_queue::{SaveHandle, SaveQueue};
pub use settings_store::SettingsStore;

use crate::controller::boot::{BootMode, ForcedSetupOptions, InputMode};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Options stored for the gamepad itself
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GamepadOptions {
    pub input_mode: InputMode,
}

/// Everything the settings store keeps on disk
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PersistedSettings {
    #[serde(default)]
    pub forced_setup: ForcedSetupOptions,
    #[serde(default)]
    pub gamepad: GamepadOptions,
}

impl PersistedSettings {
    pub fn apply(&mut self, delta: &SettingsDelta) {
        match *delta {
            SettingsDelta::InputMode(mode) => self.gamepad.input_mode = mode,
            SettingsDelta::ForcedSetup(options) => self.forced_setup = options,
        }
    }
}

/// A single pending change to the persisted settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsDelta {
    InputMode(InputMode),
    ForcedSetup(ForcedSetupOptions),
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Settings I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode settings: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("Failed to decode settings: {0}")]
    Decode(#[from] toml::de::Error),

    #[error("Save queue is full, dropped {0:?}")]
    QueueFull(SettingsDelta),

    #[error("Save queue is closed")]
    QueueClosed,
}

/// Outcome of one bounded drain
#[derive(Debug, Default)]
pub struct DrainReport {
    /// Changes written before the drain stopped
    pub written: usize,
    /// Backend failure that stopped the drain early
    pub failure: Option<StorageError>,
}

/// Storage collaborator used by the control loop
pub trait Storage {
    /// Reads the boot mode requested by the previous run and resets it to
    /// [`BootMode::Default`], so the request applies to one boot only.
    fn take_boot_directive(&mut self) -> BootMode;

    fn forced_setup_options(&self) -> ForcedSetupOptions;

    fn gamepad_options(&self) -> GamepadOptions;

    /// Queues a change for the next drain. Callable from any context.
    fn enqueue_save(&self, delta: SettingsDelta) -> Result<(), StorageError>;

    /// Applies a bounded number of queued changes without waiting.
    ///
    /// On a backend failure the failed change is kept for the next call.
    fn drain_pending_saves(&mut self) -> DrainReport;
}

/// Boot mode slot that outlives a (simulated) reboot.
///
/// Shared between the storage collaborator, which takes it at boot, and the
/// reboot collaborator, which sets it right before restarting.
#[derive(Debug, Clone, Default)]
pub struct BootModeLatch(Arc<AtomicU8>);

impl BootModeLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, mode: BootMode) {
        self.0.store(encode(mode), Ordering::SeqCst);
    }

    pub fn take(&self) -> BootMode {
        decode(self.0.swap(encode(BootMode::Default), Ordering::SeqCst))
    }

    pub fn peek(&self) -> BootMode {
        decode(self.0.load(Ordering::SeqCst))
    }
}

fn encode(mode: BootMode) -> u8 {
    match mode {
        BootMode::Default => 0,
        BootMode::Gamepad => 1,
        BootMode::WebConfig => 2,
        BootMode::Usb => 3,
    }
}

fn decode(raw: u8) -> BootMode {
    match raw {
        1 => BootMode::Gamepad,
        2 => BootMode::WebConfig,
        3 => BootMode::Usb,
        _ => BootMode::Default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latch_is_read_once() {
        let latch = BootModeLatch::new();
        assert_eq!(latch.take(), BootMode::Default);

        latch.clone().set(BootMode::WebConfig);
        assert_eq!(latch.peek(), BootMode::WebConfig);
        assert_eq!(latch.take(), BootMode::WebConfig);
        assert_eq!(latch.take(), BootMode::Default);
    }

    #[test]
    fn deltas_update_their_field() {
        let mut settings = PersistedSettings::default();
        settings.apply(&SettingsDelta::InputMode(InputMode::Switch));
        settings.apply(&SettingsDelta::ForcedSetup(ForcedSetupOptions::LockBoth));
        assert_eq!(settings.gamepad.input_mode, InputMode::Switch);
        assert_eq!(settings.forced_setup, ForcedSetupOptions::LockBoth);
    }
}
