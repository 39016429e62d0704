//! Tunables for the control core, optionally read from a TOML file.

use crate::controller::hotkeys::HotkeySettings;
use crate::controller::input_snapshot::Buttons;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// One day
pub const MAX_STATS_INTERVAL_SECS: u64 = 86_400;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unable to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unable to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct CoreConfig {
    /// Target polling frequency; the tick period is derived from it
    pub polling_hz: u32,
    pub debounce_ms: u64,
    pub hotkey_activation_ms: u64,
    pub hotkey_hold_ms: u64,
    pub webconfig_hotkey: Buttons,
    pub bootsel_hotkey: Buttons,
    pub max_saves_per_tick: usize,
    pub stats_interval_secs: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            polling_hz: 1000,
            debounce_ms: 5,
            hotkey_activation_ms: 50,
            hotkey_hold_ms: 4000,
            webconfig_hotkey: Buttons::S2 | Buttons::B3 | Buttons::B4,
            bootsel_hotkey: Buttons::S1 | Buttons::B3 | Buttons::B4,
            max_saves_per_tick: 4,
            stats_interval_secs: 30,
        }
    }
}

impl CoreConfig {
    /// `<config_dir>/padcore/core.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("padcore").join("core.toml"))
    }

    /// Loads `path` when it exists, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) if path.exists() => {
                info!("Loading core config from {}", path.display());
                toml::from_str(&fs::read_to_string(path)?)?
            }
            _ => {
                debug!("No core config file, using defaults");
                Self::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.polling_hz == 0 || self.polling_hz > 1_000_000 {
            return Err(ConfigError::Invalid(format!(
                "polling_hz must be between 1 and 1000000, got {}",
                self.polling_hz
            )));
        }
        if self.webconfig_hotkey.is_empty() || self.bootsel_hotkey.is_empty() {
            return Err(ConfigError::Invalid("hotkey masks must not be empty".into()));
        }
        if self.webconfig_hotkey == self.bootsel_hotkey {
            return Err(ConfigError::Invalid("hotkey masks must differ".into()));
        }
        if !(1..=MAX_STATS_INTERVAL_SECS).contains(&self.stats_interval_secs) {
            return Err(ConfigError::Invalid(format!(
                "stats_interval_secs must be between 1 and {}, got {}",
                MAX_STATS_INTERVAL_SECS, self.stats_interval_secs
            )));
        }
        Ok(())
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_micros(1_000_000 / u64::from(self.polling_hz.max(1)))
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn hotkeys(&self) -> HotkeySettings {
        HotkeySettings {
            activation_time: Duration::from_millis(self.hotkey_activation_ms),
            hold_time: Duration::from_millis(self.hotkey_hold_ms),
            webconfig_mask: self.webconfig_hotkey,
            bootsel_mask: self.bootsel_hotkey,
        }
    }
}
