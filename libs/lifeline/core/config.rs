//! Connection manager configuration
//!
//! Loaded from YAML by the service root or built in code through
//! [`ManagerConfig::new`] and the builder.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Default heartbeat cadence: one liveness check every 10 seconds
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 10_000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Tunables of a [`ConnectionManager`](crate::ConnectionManager)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Target server (ws:// or wss://), fixed for the lifetime of the manager
    pub endpoint: String,

    /// Liveness-check cadence in milliseconds
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Treat an open connection with no inbound traffic for this long as dead.
    /// Disabled when absent.
    #[serde(default)]
    pub stale_after_ms: Option<u64>,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_heartbeat_interval_ms() -> u64 {
    DEFAULT_HEARTBEAT_INTERVAL_MS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ManagerConfig {
    /// Configuration with defaults for everything but the endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            stale_after_ms: None,
            log_level: default_log_level(),
        }
    }

    /// Load configuration from a YAML file
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let path = config_path.as_ref();
        info!("Loading connection config from {}", path.display());

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Parse and validate configuration from a YAML document
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let config: ManagerConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.is_empty() {
            return Err(ConfigError::ValidationError(
                "endpoint cannot be empty".to_string(),
            ));
        }

        if !(self.endpoint.starts_with("ws://") || self.endpoint.starts_with("wss://")) {
            return Err(ConfigError::ValidationError(format!(
                "endpoint must start with ws:// or wss://, got '{}'",
                self.endpoint
            )));
        }

        if self.heartbeat_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "heartbeat_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.stale_after_ms == Some(0) {
            return Err(ConfigError::ValidationError(
                "stale_after_ms must be greater than 0 when set".to_string(),
            ));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "log_level must be one of: {}",
                valid_levels.join(", ")
            )));
        }

        Ok(())
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn stale_after(&self) -> Option<Duration> {
        self.stale_after_ms.map(Duration::from_millis)
    }

    /// Log the effective configuration
    pub fn log(&self) {
        info!("Connection configuration:");
        info!("  Endpoint: {}", self.endpoint);
        info!("  Heartbeat interval: {}ms", self.heartbeat_interval_ms);
        match self.stale_after_ms {
            Some(ms) => info!("  Stale after: {}ms without inbound traffic", ms),
            None => info!("  Stale detection: disabled"),
        }
        info!("  Log level: {}", self.log_level);
    }
}
