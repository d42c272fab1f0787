//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/pagetrack/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/pagetrack/` (~/.config/pagetrack/)
//! - Data: `$XDG_DATA_HOME/pagetrack/` (~/.local/share/pagetrack/)
//! - State/Logs: `$XDG_STATE_HOME/pagetrack/` (~/.local/state/pagetrack/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Tracking agent configuration
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Ingestion endpoint configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage overrides
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Tracking agent configuration
///
/// Controls when buffered events are flushed and how failed sends are retried.
#[derive(Debug, Deserialize, Clone)]
pub struct TrackerConfig {
    /// Ingestion endpoint URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Buffer size that triggers a send regardless of the cool-down
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Minimum milliseconds between send attempts while the buffer is below `batch_size`
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    /// Milliseconds to wait before requeueing a failed payload
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            batch_size: default_batch_size(),
            cooldown_ms: default_cooldown_ms(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl TrackerConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(Error::Config(format!(
                "tracker.endpoint must be an http(s) URL, got {:?}",
                self.endpoint
            )));
        }
        if self.batch_size == 0 {
            return Err(Error::Config(
                "tracker.batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_endpoint() -> String {
    "http://localhost:8888/track".to_string()
}

fn default_batch_size() -> usize {
    3
}

fn default_cooldown_ms() -> u64 {
    1000
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_timeout_secs() -> u64 {
    30
}

/// Ingestion endpoint configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Address to listen on
    #[serde(default = "default_bind")]
    pub bind: String,

    /// The single page origin allowed to post events (echoed in CORS headers)
    #[serde(default = "default_allowed_origin")]
    pub allowed_origin: String,

    /// Largest request body accepted, in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            allowed_origin: default_allowed_origin(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8888".to_string()
}

fn default_allowed_origin() -> String {
    "http://localhost:8080".to_string()
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

/// Storage overrides
#[derive(Debug, Deserialize, Default, Clone)]
pub struct StorageConfig {
    /// Override path for the events database
    pub database_path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.tracker.validate()?;
        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/pagetrack/config.toml` (~/.config/pagetrack/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("pagetrack").join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("pagetrack")
    }

    /// Returns the state directory path (for logs)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("pagetrack")
    }

    /// Returns the database file path, honoring `storage.database_path`
    ///
    /// Defaults to `$XDG_DATA_HOME/pagetrack/events.db`
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::data_dir().join("events.db"))
    }
}
