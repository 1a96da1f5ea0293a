//! Configuration parsing
//!
//! Reads settings from `~/.tribunal/config.toml`:
//!
//! ```toml
//! [stream]
//! poll_interval_ms = 500
//! max_idle_secs = 600
//!
//! [coordinator]
//! excerpt_limit = 600
//! summary_limit = 800
//! ```

use crate::coordinator::{CoordinatorLimits, DEFAULT_EXCERPT_LIMIT, DEFAULT_SUMMARY_LIMIT};
use crate::stream::StreamPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Error type for config operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Config not found at: {0}")]
    NotFound(String),

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Result type for config operations
pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TribunalConfig {
    #[serde(default)]
    pub stream: StreamConfig,

    #[serde(default)]
    pub coordinator: CoordinatorConfig,
}

/// Event stream polling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Delay between polls of an idle job channel
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Close an idle stream after this long; absent means never
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_idle_secs: Option<u64>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_idle_secs: None,
        }
    }
}

/// Event text bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    #[serde(default = "default_excerpt_limit")]
    pub excerpt_limit: usize,

    #[serde(default = "default_summary_limit")]
    pub summary_limit: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            excerpt_limit: default_excerpt_limit(),
            summary_limit: default_summary_limit(),
        }
    }
}

fn default_poll_interval_ms() -> u64 { 500 }
fn default_excerpt_limit() -> usize { DEFAULT_EXCERPT_LIMIT }
fn default_summary_limit() -> usize { DEFAULT_SUMMARY_LIMIT }

impl TribunalConfig {
    fn validate(self) -> Result<Self> {
        if self.stream.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "stream.poll_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(self)
    }

    pub fn policy(&self) -> StreamPolicy {
        let policy = StreamPolicy::default()
            .with_poll_interval(Duration::from_millis(self.stream.poll_interval_ms));
        match self.stream.max_idle_secs {
            Some(secs) => policy.with_max_idle(Duration::from_secs(secs)),
            None => policy,
        }
    }

    pub fn limits(&self) -> CoordinatorLimits {
        CoordinatorLimits {
            excerpt_limit: self.coordinator.excerpt_limit,
            summary_limit: self.coordinator.summary_limit,
        }
    }

    /// Render as TOML, for `tribunal config`.
    pub fn to_toml(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Load configuration from a file. A missing file yields the defaults.
pub fn load_config(config_path: &Path) -> Result<TribunalConfig> {
    if !config_path.exists() {
        return Ok(TribunalConfig::default());
    }

    let content = std::fs::read_to_string(config_path)?;
    let config: TribunalConfig = toml::from_str(&content)?;
    config.validate()
}

/// Load configuration from a file that must exist.
pub fn load_config_strict(config_path: &Path) -> Result<TribunalConfig> {
    if !config_path.exists() {
        return Err(ConfigError::NotFound(config_path.display().to_string()));
    }
    load_config(config_path)
}
