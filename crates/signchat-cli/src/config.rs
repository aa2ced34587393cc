//! Configuration management for the signchat CLI
//!
//! Configuration is stored in TOML format at the platform config directory:
//!
//! - Linux: `~/.config/signchat/config.toml`
//! - macOS: `~/Library/Application Support/io.signchat.signchat/config.toml`
//! - Windows: `%APPDATA%\signchat\signchat\config\config.toml`
//!
//! The server password is never stored here. It is read from `--password` or
//! the `SIGNCHAT_PASSWORD` environment variable.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse config file
    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// CLI configuration
///
/// # Example TOML
///
/// ```toml
/// [server]
/// url = "http://localhost:5000"
/// channel = "general"
/// name = "alice"
/// timeout_seconds = 30
///
/// [storage]
/// prefs_path = ""  # Empty = default location
///
/// [output]
/// format = "table"  # "table" | "json" | "quiet"
/// verbose = false
///
/// [logging]
/// level = "warn"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server and channel selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server base URL
    #[serde(default = "default_url")]
    pub url: String,

    /// Channel to send to and read from
    #[serde(default = "default_channel")]
    pub channel: String,

    /// Username attached to sent messages
    #[serde(default = "default_name")]
    pub name: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_channel() -> String {
    "general".to_string()
}

fn default_name() -> String {
    "anonymous".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            channel: default_channel(),
            name: default_name(),
            timeout_seconds: default_timeout(),
        }
    }
}

/// Local state storage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the preference file holding the key and trusted users
    /// (empty = default location)
    #[serde(default)]
    pub prefs_path: Option<PathBuf>,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output format: "table", "json", "quiet"
    #[serde(default = "default_format")]
    pub format: String,

    #[serde(default)]
    pub verbose: bool,
}

fn default_format() -> String {
    "table".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            verbose: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default location
    pub fn load_default() -> Result<Self, ConfigError> {
        if let Some(path) = Self::default_path() {
            if path.exists() {
                return Self::load(&path);
            }
        }
        Ok(Self::default())
    }

    /// Load configuration from custom path or default
    pub fn load_from(custom_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = custom_path {
            Self::load(path)
        } else {
            Self::load_default()
        }
    }

    /// Get default configuration file path
    pub fn default_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Get the config directory path
    pub fn config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("io", "signchat", "signchat")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Preference file to use: the configured path or the platform default
    pub fn prefs_path(&self) -> Option<PathBuf> {
        self.storage
            .prefs_path
            .clone()
            .filter(|p| !p.as_os_str().is_empty())
            .or_else(signchat_core::JsonFilePrefs::default_path)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Create default configuration file if it doesn't exist
    pub fn create_default_if_missing() -> Result<bool, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::create_sample_at(&path),
            None => Ok(false),
        }
    }

    /// Write the commented sample config to `path` unless a file is already there
    pub fn create_sample_at(path: &Path) -> Result<bool, ConfigError> {
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, Self::sample_toml())?;
        Ok(true)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = url::Url::parse(&self.server.url).map_err(|e| {
            ConfigError::ValidationError(format!("Invalid server URL '{}': {e}", self.server.url))
        })?;
        let valid_schemes = ["http", "https"];
        if !valid_schemes.contains(&url.scheme()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid server URL '{}': must start with http:// or https://",
                self.server.url
            )));
        }

        if self.server.channel.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "channel must not be empty".to_string(),
            ));
        }

        if self.server.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "name must not be empty".to_string(),
            ));
        }

        if self.server.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "timeout_seconds must be greater than 0".to_string(),
            ));
        }

        let valid_formats = ["table", "json", "quiet"];
        if !valid_formats.contains(&self.output.format.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid output format '{}'. Valid values: {:?}",
                self.output.format, valid_formats
            )));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log level '{}'. Valid values: {:?}",
                self.logging.level, valid_levels
            )));
        }

        Ok(())
    }

    /// Generate a sample configuration file content
    pub fn sample_toml() -> &'static str {
        r#"# SignChat CLI Configuration

[server]
# Server base URL
url = "http://localhost:5000"
# Channel to send to and read from
channel = "general"
# Username attached to sent messages
name = "anonymous"
# Request timeout in seconds
timeout_seconds = 30

[storage]
# Preference file holding the signing key and trusted users
# (empty = default location)
# prefs_path = ""

[output]
# Output format: "table", "json", "quiet"
format = "table"
verbose = false

[logging]
# Log level: "error", "warn", "info", "debug", "trace"
level = "warn"
"#
    }
}

/// CLI configuration overrides
///
/// Command-line arguments take precedence over config file values.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub output_format: Option<String>,
    pub verbose: Option<bool>,
    pub debug: Option<bool>,
    pub server_url: Option<String>,
    pub channel: Option<String>,
    pub name: Option<String>,
    pub prefs_path: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to configuration
    pub fn with_overrides(mut self, overrides: &CliOverrides) -> Self {
        if let Some(ref format) = overrides.output_format {
            self.output.format = format.clone();
        }
        if let Some(verbose) = overrides.verbose {
            self.output.verbose = verbose;
        }
        if overrides.debug == Some(true) {
            self.logging.level = "debug".to_string();
        }
        if let Some(ref url) = overrides.server_url {
            self.server.url = url.clone();
        }
        if let Some(ref channel) = overrides.channel {
            self.server.channel = channel.clone();
        }
        if let Some(ref name) = overrides.name {
            self.server.name = name.clone();
        }
        if let Some(ref path) = overrides.prefs_path {
            self.storage.prefs_path = Some(path.clone());
        }
        self
    }
}
