//! Watcher configuration: TOML file plus environment overrides

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ENV_BACKEND: &str = "PATHWATCH_BACKEND";
pub const ENV_POLL_INTERVAL_MS: &str = "PATHWATCH_POLL_INTERVAL_MS";
pub const ENV_INCLUDE_SUBDIRECTORIES: &str = "PATHWATCH_INCLUDE_SUBDIRECTORIES";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Which `notify` backend drives the watch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Native backend for the platform
    #[default]
    Recommended,
    /// Periodic directory scans, for network mounts and containers without inotify
    Poll,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    pub backend: Backend,
    pub poll_interval_ms: u64,
    /// Only applies to directory targets
    pub include_subdirectories: bool,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Recommended,
            poll_interval_ms: 500,
            include_subdirectories: false,
        }
    }
}

impl WatcherConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config = toml::from_str(raw)?;
        Ok(config)
    }

    /// Read a TOML file and apply environment overrides on top
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&raw)?;
        config.apply_env_overrides()?;
        tracing::debug!(path = %path.display(), ?config, "Loaded watcher config");
        Ok(config)
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_BACKEND) {
            self.backend = match value.trim().to_ascii_lowercase().as_str() {
                "recommended" | "native" => Backend::Recommended,
                "poll" => Backend::Poll,
                _ => return Err(invalid(ENV_BACKEND, &value)),
            };
        }

        if let Some(value) = lookup(ENV_POLL_INTERVAL_MS) {
            self.poll_interval_ms = value
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|ms| *ms > 0)
                .ok_or_else(|| invalid(ENV_POLL_INTERVAL_MS, &value))?;
        }

        if let Some(value) = lookup(ENV_INCLUDE_SUBDIRECTORIES) {
            self.include_subdirectories = match value.trim() {
                "1" | "true" => true,
                "0" | "false" => false,
                _ => return Err(invalid(ENV_INCLUDE_SUBDIRECTORIES, &value)),
            };
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}
