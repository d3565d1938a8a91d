//! Configuration system for ds-anywhere

use crate::error::{EmulatorError, Result, SettingsError};
use crate::firmware::FirmwareSettings;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub audio: AudioConfig,
    pub input: InputSettings,
    pub firmware: FirmwareSettings,
    pub paths: PathConfig,
    pub debug: DebugConfig,
}

/// General session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Cart image to boot when the binary starts
    pub rom: Option<PathBuf>,
    /// Frame speed multiplier
    pub speed: f64,
    /// Stop the headless runner after this many seconds (0 runs until stopped)
    pub run_seconds: u64,
}

/// Audio settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub backend: AudioBackend,
    pub enable: bool,
    pub volume: f32,
    /// Ring buffer capacity in stereo sample pairs
    pub ring_capacity: usize,
}

/// Audio backend type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum AudioBackend {
    #[default]
    Auto,
    Null,
}

/// Input settings, kept in the settings-store form
///
/// `keybinds` maps key identifiers to a single button bit. Keys listed in
/// `alternate_keybinds` occupy the alternate slot of their button.
/// `gamepad_binds` maps button names (`DPAD_RIGHT`) to physical button indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InputSettings {
    pub rumble_enabled: bool,
    pub keybinds: BTreeMap<String, u16>,
    pub alternate_keybinds: BTreeSet<String>,
    pub gamepad_axis_sensitivity: f32,
    pub gamepad_binds: BTreeMap<String, Vec<usize>>,
    pub gamepad_rumble_intensity: f32,
}

/// Default keyboard layout: key -> button bit
const DEFAULT_KEYBINDS: [(&str, u16); 12] = [
    ("w", 1 << 6),  // up
    ("a", 1 << 5),  // left
    ("s", 1 << 7),  // down
    ("d", 1 << 4),  // right
    ("q", 1 << 9),  // L
    ("o", 1 << 8),  // R
    ("i", 1 << 10), // X
    ("l", 1 << 0),  // A
    ("k", 1 << 1),  // B
    ("j", 1 << 11), // Y
    ("v", 1 << 2),  // select
    ("b", 1 << 3),  // start
];

/// Default standard-layout controller mapping
const DEFAULT_GAMEPAD_BINDS: [(&str, &[usize]); 12] = [
    ("A", &[1]),
    ("B", &[0]),
    ("SELECT", &[8]),
    ("START", &[9]),
    ("DPAD_RIGHT", &[15]),
    ("DPAD_LEFT", &[14]),
    ("DPAD_UP", &[12]),
    ("DPAD_DOWN", &[13]),
    ("R", &[5, 7]),
    ("L", &[4, 6]),
    ("X", &[3]),
    ("Y", &[2]),
];

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            rumble_enabled: true,
            keybinds: DEFAULT_KEYBINDS
                .iter()
                .map(|(key, bit)| (key.to_string(), *bit))
                .collect(),
            alternate_keybinds: BTreeSet::new(),
            gamepad_axis_sensitivity: 0.5,
            gamepad_binds: DEFAULT_GAMEPAD_BINDS
                .iter()
                .map(|(name, indices)| (name.to_string(), indices.to_vec()))
                .collect(),
            gamepad_rumble_intensity: 0.5,
        }
    }
}

impl InputSettings {
    /// Check the analog settings are within `[0, 1]`
    pub fn validate(&self) -> std::result::Result<(), SettingsError> {
        for (name, value) in [
            ("gamepadAxisSensitivity", self.gamepad_axis_sensitivity),
            ("gamepadRumbleIntensity", self.gamepad_rumble_intensity),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(SettingsError::OutOfRange { name, value });
            }
        }
        Ok(())
    }

    /// Serialize to the settings-store JSON form
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse the settings-store JSON form
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Path configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Host directory backing the durable mounts
    pub storage: PathBuf,
}

/// Debug settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub log_level: LogLevel,
    pub log_to_file: bool,
    pub log_path: PathBuf,
}

/// Logging level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

// Default implementations

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            rom: None,
            speed: 1.0,
            run_seconds: 0,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            backend: AudioBackend::default(),
            enable: true,
            volume: 1.0,
            ring_capacity: 8192,
        }
    }
}

impl Default for PathConfig {
    fn default() -> Self {
        let base = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ds-anywhere");

        Self {
            storage: base.join("storage"),
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            log_to_file: false,
            log_path: PathBuf::from("ds-anywhere.log"),
        }
    }
}

impl Config {
    /// Load configuration from file, or create default if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a specific file, writing defaults if it is missing
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config =
                toml::from_str(&content).map_err(|e| EmulatorError::Config(e.to_string()))?;
            config.input.validate()?;
            config.firmware.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| EmulatorError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the path to the configuration file
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ds-anywhere")
            .join("config.toml")
    }
}
