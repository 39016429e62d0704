//! TOML-backed storage collaborator for host builds.

use super::{
    BootModeLatch, DrainReport, GamepadOptions, PersistedSettings, SaveHandle, SaveQueue,
    SettingsDelta, Storage, StorageError,
};
use crate::controller::boot::{BootMode, ForcedSetupOptions};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const SETTINGS_FILE: &str = "settings.toml";

#[derive(Debug)]
pub struct SettingsStore {
    // `None` keeps everything in memory
    path: Option<PathBuf>,
    settings: PersistedSettings,
    latch: BootModeLatch,
    queue: SaveQueue,
}

impl SettingsStore {
    pub fn in_memory(
        settings: PersistedSettings,
        latch: BootModeLatch,
        max_saves_per_tick: usize,
    ) -> Self {
        debug!("Creating in-memory settings store");
        Self {
            path: None,
            settings,
            latch,
            queue: SaveQueue::new(max_saves_per_tick),
        }
    }

    /// Opens the settings file at `path`, falling back to defaults when it is
    /// missing or unreadable.
    pub fn open(path: impl Into<PathBuf>, latch: BootModeLatch, max_saves_per_tick: usize) -> Self {
        let path = path.into();
        let settings = match load(&path) {
            Ok(Some(settings)) => {
                info!("Loaded settings from {}", path.display());
                settings
            }
            Ok(None) => {
                info!("No settings at {}, using defaults", path.display());
                PersistedSettings::default()
            }
            Err(e) => {
                warn!("Unable to read settings at {}, using defaults: {}", path.display(), e);
                PersistedSettings::default()
            }
        };

        Self {
            path: Some(path),
            settings,
            latch,
            queue: SaveQueue::new(max_saves_per_tick),
        }
    }

    /// `<data_dir>/padcore/settings.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("padcore").join(SETTINGS_FILE))
    }

    pub fn settings(&self) -> &PersistedSettings {
        &self.settings
    }

    pub fn save_handle(&self) -> SaveHandle {
        self.queue.handle()
    }
}

fn load(path: &Path) -> Result<Option<PersistedSettings>, StorageError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    Ok(Some(toml::from_str(&content)?))
}

fn write(path: &Path, settings: &PersistedSettings) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(settings)?;
    let staging = path.with_extension("toml.tmp");
    fs::write(&staging, content)?;
    fs::rename(&staging, path)?;
    Ok(())
}

impl Storage for SettingsStore {
    fn take_boot_directive(&mut self) -> BootMode {
        self.latch.take()
    }

    fn forced_setup_options(&self) -> ForcedSetupOptions {
        self.settings.forced_setup
    }

    fn gamepad_options(&self) -> GamepadOptions {
        self.settings.gamepad
    }

    fn enqueue_save(&self, delta: SettingsDelta) -> Result<(), StorageError> {
        self.queue.handle().enqueue(delta)
    }

    fn drain_pending_saves(&mut self) -> DrainReport {
        let Self {
            path,
            settings,
            queue,
            ..
        } = self;

        queue.drain(|delta| {
            let mut updated = *settings;
            updated.apply(delta);
            if let Some(path) = path.as_deref() {
                write(path, &updated)?;
            }
            *settings = updated;
            info!("Saved settings change {:?}", delta);
            Ok(())
        })
    }
}
