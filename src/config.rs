// Configuration File Support
//
// This module provides configuration file parsing for the boardroom quota service.
// Supports TOML format with environment variable overrides.
// Configuration files are loaded from XDG config directory: ~/.config/boardroom/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::rate_limit::RateLimitConfig;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// HTTP server configuration
    pub server: ServerConfig,

    /// Request rate limiting
    pub rate_limit: RateLimitConfig,

    /// Premium usage tracking
    pub usage: UsageConfig,

    /// Metrics configuration
    pub metrics: MetricsConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind
    pub bind_address: String,

    /// Port to listen on
    pub port: u16,

    /// Interval between rate limit bucket evictions, in seconds
    pub eviction_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8080,
            eviction_interval_secs: 300,
        }
    }
}

/// Usage tracking configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UsageConfig {
    /// Directory holding the usage log
    pub data_dir: String,

    /// Interval between retention sweeps, in seconds
    pub sweep_interval_secs: u64,

    /// Records older than this many days are purged
    pub retention_days: i64,
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            sweep_interval_secs: crate::maintenance::DEFAULT_SWEEP_INTERVAL.as_secs(),
            retention_days: crate::usage::tracker::DEFAULT_RETENTION_DAYS,
        }
    }
}

fn default_data_dir() -> String {
    directories::ProjectDirs::from("com", "boardroom", "Boardroom")
        .map(|dirs| dirs.data_dir().to_string_lossy().into_owned())
        .unwrap_or_else(|| "./data".to_string())
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether to expose the /metrics endpoint
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Config {
    /// Load configuration from the default XDG config directory
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    /// If the config file does not exist, returns default configuration.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    ///
    /// Environment overrides are applied whether or not the file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed, or
    /// if the resulting configuration is invalid.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file from {:?}", path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file from {:?}", path))?;
            tracing::info!("Loaded configuration from {:?}", path);
            config
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            Self::default()
        };

        let config = config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/boardroom/config.toml` on Linux
    pub fn config_path() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("com", "boardroom", "Boardroom") {
            proj_dirs.config_dir().join("config.toml")
        } else {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home)
                .join(".config")
                .join("boardroom")
                .join("config.toml")
        }
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Environment variables take precedence over config file values:
    /// - BOARDROOM_LOG_LEVEL
    /// - BOARDROOM_LOG_FORMAT
    /// - BOARDROOM_BIND_ADDRESS
    /// - BOARDROOM_PORT
    /// - BOARDROOM_RATE_LIMIT_ENABLED
    /// - BOARDROOM_RATE_LIMIT_MAX_REQUESTS
    /// - BOARDROOM_RATE_LIMIT_WINDOW_MS
    /// - BOARDROOM_DATA_DIR
    /// - BOARDROOM_SWEEP_INTERVAL_SECS
    /// - BOARDROOM_METRICS_ENABLED
    fn apply_env_overrides(mut self) -> Self {
        // Logging overrides
        if let Ok(level) = std::env::var("BOARDROOM_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("BOARDROOM_LOG_FORMAT") {
            self.logging.format = format;
        }

        // Server overrides
        if let Ok(addr) = std::env::var("BOARDROOM_BIND_ADDRESS") {
            self.server.bind_address = addr;
        }
        if let Ok(port) = std::env::var("BOARDROOM_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }

        // Rate limit overrides
        if let Ok(enabled) = std::env::var("BOARDROOM_RATE_LIMIT_ENABLED") {
            self.rate_limit.enabled = enabled.parse().unwrap_or(self.rate_limit.enabled);
        }
        if let Ok(limit) = std::env::var("BOARDROOM_RATE_LIMIT_MAX_REQUESTS") {
            if let Ok(limit) = limit.parse::<u32>() {
                if limit > 0 {
                    self.rate_limit.max_requests = limit;
                }
            }
        }
        if let Ok(window) = std::env::var("BOARDROOM_RATE_LIMIT_WINDOW_MS") {
            if let Ok(window) = window.parse::<u64>() {
                if window > 0 {
                    self.rate_limit.window_ms = window;
                }
            }
        }

        // Usage overrides
        if let Ok(dir) = std::env::var("BOARDROOM_DATA_DIR") {
            self.usage.data_dir = dir;
        }
        if let Ok(interval) = std::env::var("BOARDROOM_SWEEP_INTERVAL_SECS") {
            if let Ok(interval) = interval.parse::<u64>() {
                if interval > 0 {
                    self.usage.sweep_interval_secs = interval;
                }
            }
        }

        // Metrics overrides
        if let Ok(enabled) = std::env::var("BOARDROOM_METRICS_ENABLED") {
            self.metrics.enabled = enabled.parse().unwrap_or(self.metrics.enabled);
        }

        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            ),
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => anyhow::bail!(
                "Invalid log format: {}. Must be one of: json, pretty, compact",
                self.logging.format
            ),
        }

        if self.server.eviction_interval_secs == 0 {
            anyhow::bail!("Eviction interval must be > 0 seconds");
        }

        self.rate_limit.validate()?;

        if self.usage.data_dir.trim().is_empty() {
            anyhow::bail!("Usage data directory must not be empty");
        }
        if self.usage.sweep_interval_secs == 0 {
            anyhow::bail!("Usage sweep interval must be > 0 seconds");
        }
        if self.usage.retention_days <= 0 {
            anyhow::bail!("Usage retention must be at least 1 day");
        }

        Ok(())
    }
}
