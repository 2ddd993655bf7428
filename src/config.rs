//! Configuration management for the keyboard timing recorder
//!
//! Settings are loaded from a platform-specific config file and can be
//! overridden from the command line.
//!
//! ## Config File Locations
//!
//! | Platform | Path |
//! |----------|------|
//! | Linux | `~/.config/keyboard-timing/config.toml` |
//! | macOS | `~/Library/Application Support/keyboard-timing/config.toml` |
//! | Windows | `%APPDATA%\keyboard-timing\config.toml` |
//!
//! ## Example
//!
//! ```no_run
//! use keyboard_timing::Config;
//!
//! let mut config = Config::load().unwrap_or_default();
//! config.capture.infer_repeats = true;
//! config.save().expect("Failed to save config");
//! ```

use crate::keyboard::{CaptureMode, KeyCodeSet, DEFAULT_CAPACITY};
use crate::report::{self, OutputFormat};
use crate::session::SessionConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Error type for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to determine config directory
    NoConfigDir,
    /// IO error reading or writing config file
    Io(io::Error),
    /// Failed to parse config file
    Parse(toml::de::Error),
    /// Failed to serialize config
    Serialize(toml::ser::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NoConfigDir => write!(f, "Could not determine config directory"),
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Serialize(e) => write!(f, "Serialize error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(e: toml::ser::Error) -> Self {
        ConfigError::Serialize(e)
    }
}

/// Returns the path to the config file.
///
/// Creates the config directory if it doesn't exist.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    let app_dir = config_dir.join("keyboard-timing");

    if !app_dir.exists() {
        fs::create_dir_all(&app_dir)?;
    }

    Ok(app_dir.join("config.toml"))
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Capture settings
    pub capture: CaptureConfig,
    /// Output file settings
    pub output: OutputConfig,
}

/// Which capture adapter to open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Evdev where available, polling otherwise
    #[default]
    Auto,
    /// Kernel input devices (Linux only)
    Evdev,
    /// Cross-platform key state polling
    Poll,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Auto => "auto",
            Backend::Evdev => "evdev",
            Backend::Poll => "poll",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Backend::Auto),
            "evdev" => Ok(Backend::Evdev),
            "poll" => Ok(Backend::Poll),
            other => Err(format!(
                "unknown backend '{}' (expected auto, evdev or poll)",
                other
            )),
        }
    }
}

/// Capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CaptureConfig {
    /// Maximum number of events kept in memory
    pub capacity: usize,
    /// Sleep between adapter polls, in microseconds
    pub poll_interval_us: u64,
    /// Key code whose key-down ends the recording
    pub stop_key: Option<i32>,
    /// Infer auto-repeat from held keys when the backend does not report it
    pub infer_repeats: bool,
    /// Capture backend
    pub backend: Backend,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            poll_interval_us: 1000,
            stop_key: None,
            infer_repeats: false,
            backend: Backend::Auto,
        }
    }
}

/// Output file configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory used when no output path is given
    pub directory: PathBuf,
    /// File name without extension
    pub file_stem: String,
    /// Report format
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("output"),
            file_stem: "rust_keyboard_timing".to_string(),
            format: OutputFormat::Csv,
        }
    }
}

impl Config {
    /// Load configuration from the default config file.
    ///
    /// Returns the default configuration if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to the default config file.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = config_path()?;
        self.save_to(&path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Destination used when none is given on the command line
    pub fn default_output_path(&self) -> PathBuf {
        self.output
            .directory
            .join(&self.output.file_stem)
            .with_extension(self.output.format.extension())
    }

    /// Get adapter poll interval as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_micros(self.capture.poll_interval_us)
    }

    /// Session settings for an adapter producing `code_set` codes in `mode`
    pub fn session_config(&self, code_set: KeyCodeSet, mode: CaptureMode) -> SessionConfig {
        SessionConfig {
            capacity: self.capture.capacity,
            code_set,
            mode,
            platform: report::platform_identifier(),
            stop_key: self.capture.stop_key,
            infer_repeats: self.capture.infer_repeats,
        }
    }
}
