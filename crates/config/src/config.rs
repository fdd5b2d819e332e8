//! Core configuration structures and loading logic

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default seconds between directory polls
pub const DEFAULT_INTERVAL_SECS: u64 = 5;
/// Default suffix marking converted files
pub const DEFAULT_SUFFIX: &str = "-x265";
/// Default minimum size of a converted file in bytes
pub const DEFAULT_MIN_SIZE_BYTES: u64 = 1_000_000;
/// Default number of newest eligible files left untouched
pub const DEFAULT_BUFFER_SIZE: usize = 2;
/// Default quiescence period since last modification
pub const DEFAULT_WAIT_TIME_SECS: u64 = 10;
/// Default encoder executable, resolved on `PATH`
pub const DEFAULT_ENCODER: &str = "HandBrakeCLI";

/// Error type for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
    /// A value is missing or unusable
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// How the preset name handed to the encoder is chosen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresetSelection {
    /// Use the first preset declared in the preset file
    FirstDeclared,
    /// Use this exact name; the preset file must declare it
    Fixed(String),
}

/// Watch-and-convert configuration.
///
/// Built once at startup and shared read-only with every component.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatchConfig {
    /// Directory polled for new videos
    #[serde(default)]
    pub watch_dir: PathBuf,
    /// Seconds to sleep between cycles
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Suffix appended to converted file stems
    #[serde(default = "default_suffix")]
    pub suffix: String,
    /// HandBrake preset export (JSON)
    #[serde(default)]
    pub preset_path: PathBuf,
    /// Fixed preset name; unset means the first declared preset
    #[serde(default)]
    pub preset_name: Option<String>,
    /// Smallest acceptable converted output in bytes
    #[serde(default = "default_min_size_bytes")]
    pub min_size_bytes: u64,
    /// Newest eligible files always left alone
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Seconds a file must be unmodified before it is eligible
    #[serde(default = "default_wait_time_secs")]
    pub wait_time_secs: u64,
    /// Verbose logging
    #[serde(default)]
    pub verbose: bool,
    /// Encoder executable name or path
    #[serde(default = "default_encoder")]
    pub encoder: String,
    /// Consecutive failures after which a file is no longer attempted (unset = never give up)
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}

fn default_suffix() -> String {
    DEFAULT_SUFFIX.to_string()
}

fn default_min_size_bytes() -> u64 {
    DEFAULT_MIN_SIZE_BYTES
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

fn default_wait_time_secs() -> u64 {
    DEFAULT_WAIT_TIME_SECS
}

fn default_encoder() -> String {
    DEFAULT_ENCODER.to_string()
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            watch_dir: PathBuf::new(),
            interval_secs: default_interval_secs(),
            suffix: default_suffix(),
            preset_path: PathBuf::new(),
            preset_name: None,
            min_size_bytes: default_min_size_bytes(),
            buffer_size: default_buffer_size(),
            wait_time_secs: default_wait_time_secs(),
            verbose: false,
            encoder: default_encoder(),
            max_attempts: None,
        }
    }
}

impl WatchConfig {
    /// Load configuration from a TOML file
    ///
    /// Missing fields fall back to their defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: WatchConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Overrides the following values if environment variables are set:
    /// - HANDBRAKED_WATCH_DIR -> watch_dir
    /// - HANDBRAKED_INTERVAL -> interval_secs
    /// - HANDBRAKED_SUFFIX -> suffix
    /// - HANDBRAKED_PRESET -> preset_path
    /// - HANDBRAKED_PRESET_NAME -> preset_name
    /// - HANDBRAKED_MIN_SIZE -> min_size_bytes
    /// - HANDBRAKED_BUFFER_SIZE -> buffer_size
    /// - HANDBRAKED_WAIT_TIME -> wait_time_secs
    /// - HANDBRAKED_VERBOSE -> verbose
    /// - HANDBRAKED_ENCODER -> encoder
    /// - HANDBRAKED_MAX_ATTEMPTS -> max_attempts
    ///
    /// Values that fail to parse leave the existing setting in place.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("HANDBRAKED_WATCH_DIR") {
            self.watch_dir = PathBuf::from(val);
        }

        if let Some(secs) = env_parse::<u64>("HANDBRAKED_INTERVAL") {
            self.interval_secs = secs;
        }

        if let Ok(val) = env::var("HANDBRAKED_SUFFIX") {
            self.suffix = val;
        }

        if let Ok(val) = env::var("HANDBRAKED_PRESET") {
            self.preset_path = PathBuf::from(val);
        }

        if let Ok(val) = env::var("HANDBRAKED_PRESET_NAME") {
            self.preset_name = Some(val);
        }

        if let Some(bytes) = env_parse::<u64>("HANDBRAKED_MIN_SIZE") {
            self.min_size_bytes = bytes;
        }

        if let Some(size) = env_parse::<usize>("HANDBRAKED_BUFFER_SIZE") {
            self.buffer_size = size;
        }

        if let Some(secs) = env_parse::<u64>("HANDBRAKED_WAIT_TIME") {
            self.wait_time_secs = secs;
        }

        if let Ok(val) = env::var("HANDBRAKED_VERBOSE") {
            // Accept "true", "1", "yes" as true; "false", "0", "no" as false
            match val.to_lowercase().as_str() {
                "true" | "1" | "yes" => self.verbose = true,
                "false" | "0" | "no" => self.verbose = false,
                _ => {}
            }
        }

        if let Ok(val) = env::var("HANDBRAKED_ENCODER") {
            self.encoder = val;
        }

        if let Some(attempts) = env_parse::<u32>("HANDBRAKED_MAX_ATTEMPTS") {
            self.max_attempts = Some(attempts);
        }
    }

    /// Load configuration from file and apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Check the values a running daemon cannot do without.
    ///
    /// Only shape is checked here; whether the paths exist is a startup concern.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.watch_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("watch directory is required".to_string()));
        }
        if self.preset_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("preset path is required".to_string()));
        }
        // An empty suffix would mark every file as already converted
        if self.suffix.is_empty() {
            return Err(ConfigError::Invalid("suffix must not be empty".to_string()));
        }
        if self.encoder.trim().is_empty() {
            return Err(ConfigError::Invalid("encoder must not be empty".to_string()));
        }
        if self.max_attempts == Some(0) {
            return Err(ConfigError::Invalid("max attempts must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Poll interval as a duration
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Quiescence period as a duration
    pub fn wait_time(&self) -> Duration {
        Duration::from_secs(self.wait_time_secs)
    }

    /// How the preset name is resolved
    pub fn preset_selection(&self) -> PresetSelection {
        match &self.preset_name {
            Some(name) => PresetSelection::Fixed(name.clone()),
            None => PresetSelection::FirstDeclared,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|val| val.trim().parse().ok())
}
