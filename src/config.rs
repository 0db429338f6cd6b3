//! Configuration management for obdwatch
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{ObdWatchError, Result};
use crate::session::SessionSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub use crate::session::buffer::MAX_BUFFER_CAPACITY;

/// Main configuration structure for obdwatch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Backend endpoints
    #[serde(default)]
    pub server: ServerConfig,
    /// Session lifecycle tunables
    #[serde(default)]
    pub session: SessionConfig,
    /// Telemetry buffer settings
    #[serde(default)]
    pub buffer: BufferConfig,
    /// Notification policy
    #[serde(default)]
    pub notifications: NotificationConfig,
    /// Logging setup
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// WebSocket endpoint streaming telemetry and chat
    #[serde(default = "default_ws_url")]
    pub ws_url: String,

    /// Base URL for the REST endpoints (`/api/...`)
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Timeout for REST requests (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_ws_url() -> String {
    "ws://localhost:8000/ws".to_string()
}

fn default_api_base() -> String {
    "http://localhost:8000".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            api_base: default_api_base(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Session lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Wait before reopening a failed channel (milliseconds)
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Interval between heartbeat pings (seconds)
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// Connect as soon as the monitor starts
    #[serde(default = "default_auto_connect")]
    pub auto_connect: bool,
}

fn default_reconnect_delay_ms() -> u64 {
    3000
}

fn default_heartbeat_interval() -> u64 {
    30
}

fn default_auto_connect() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: default_reconnect_delay_ms(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            auto_connect: default_auto_connect(),
        }
    }
}

/// Telemetry buffer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Maximum number of samples kept for display
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_capacity() -> usize {
    crate::session::buffer::DEFAULT_BUFFER_CAPACITY
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

/// Notification policy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Request the notification sound for every new sample
    #[serde(default)]
    pub sound_on_sample: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json_format: bool,

    /// Also append log output to this file
    #[serde(default)]
    pub file_path: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
            file_path: None,
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ObdWatchError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| ObdWatchError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(ws_url) = std::env::var("OBDWATCH_WS_URL") {
            self.server.ws_url = ws_url;
        }

        if let Ok(api_base) = std::env::var("OBDWATCH_API_BASE") {
            self.server.api_base = api_base;
        }

        if let Ok(capacity) = std::env::var("OBDWATCH_BUFFER_CAPACITY") {
            if let Ok(value) = capacity.parse() {
                self.buffer.capacity = value;
            } else {
                tracing::warn!("Invalid OBDWATCH_BUFFER_CAPACITY: {}", capacity);
            }
        }

        if let Ok(delay) = std::env::var("OBDWATCH_RECONNECT_DELAY_MS") {
            if let Ok(value) = delay.parse() {
                self.session.reconnect_delay_ms = value;
            } else {
                tracing::warn!("Invalid OBDWATCH_RECONNECT_DELAY_MS: {}", delay);
            }
        }

        if let Ok(interval) = std::env::var("OBDWATCH_HEARTBEAT_SECS") {
            if let Ok(value) = interval.parse() {
                self.session.heartbeat_interval_secs = value;
            } else {
                tracing::warn!("Invalid OBDWATCH_HEARTBEAT_SECS: {}", interval);
            }
        }

        if let Ok(level) = std::env::var("OBDWATCH_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.verbose {
            self.logging.level = "debug".to_string();
        }

        if let crate::cli::Commands::Monitor {
            url,
            capacity,
            no_connect,
            sound,
        } = &cli.command
        {
            if let Some(url) = url {
                self.server.ws_url = url.clone();
            }
            if let Some(capacity) = capacity {
                self.buffer.capacity = *capacity;
            }
            if *no_connect {
                self.session.auto_connect = false;
            }
            if *sound {
                self.notifications.sound_on_sample = true;
            }
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`ObdWatchError::Config`] describing the first invalid value
    pub fn validate(&self) -> Result<()> {
        self.ws_url()?;
        self.api_base()?;

        if self.buffer.capacity == 0 {
            return Err(
                ObdWatchError::Config("buffer.capacity must be greater than 0".to_string()).into(),
            );
        }

        if self.buffer.capacity > MAX_BUFFER_CAPACITY {
            return Err(ObdWatchError::Config(format!(
                "buffer.capacity must be less than or equal to {}",
                MAX_BUFFER_CAPACITY
            ))
            .into());
        }

        if self.session.reconnect_delay_ms == 0 {
            return Err(ObdWatchError::Config(
                "session.reconnect_delay_ms must be greater than 0".to_string(),
            )
            .into());
        }

        if self.session.heartbeat_interval_secs == 0 {
            return Err(ObdWatchError::Config(
                "session.heartbeat_interval_secs must be greater than 0".to_string(),
            )
            .into());
        }

        if self.server.request_timeout_secs == 0 {
            return Err(ObdWatchError::Config(
                "server.request_timeout_secs must be greater than 0".to_string(),
            )
            .into());
        }

        Ok(())
    }

    /// Parsed WebSocket URL
    ///
    /// # Errors
    ///
    /// Returns [`ObdWatchError::Config`] if the URL does not parse or is not
    /// `ws`/`wss`.
    pub fn ws_url(&self) -> Result<Url> {
        parse_url(&self.server.ws_url, "server.ws_url", &["ws", "wss"])
    }

    /// Parsed REST base URL
    ///
    /// # Errors
    ///
    /// Returns [`ObdWatchError::Config`] if the URL does not parse or is not
    /// `http`/`https`.
    pub fn api_base(&self) -> Result<Url> {
        parse_url(&self.server.api_base, "server.api_base", &["http", "https"])
    }

    /// Session tunables derived from this configuration
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            reconnect_delay: Duration::from_millis(self.session.reconnect_delay_ms),
            heartbeat_interval: Duration::from_secs(self.session.heartbeat_interval_secs),
            buffer_capacity: self.buffer.capacity,
            sound_on_sample: self.notifications.sound_on_sample,
        }
    }
}

fn parse_url(value: &str, field: &str, schemes: &[&str]) -> Result<Url> {
    let url = Url::parse(value)
        .map_err(|e| ObdWatchError::Config(format!("Invalid {} '{}': {}", field, value, e)))?;
    if !schemes.contains(&url.scheme()) {
        return Err(ObdWatchError::Config(format!(
            "Invalid {} scheme: {}. Must be one of: {}",
            field,
            url.scheme(),
            schemes.join(", ")
        ))
        .into());
    }
    Ok(url)
}
