//! Pipeline configuration.
//!
//! ## Environment
//!
//! - `CONTAINMENT_SIGNATURE_TIMEOUT_MS`: bound on one signing attempt (default: 2000)
//! - `CONTAINMENT_KEY_CACHE_SIZE`: resolved-key cache entries, `0` disables (default: 1000)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for development (default: json)

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::signature::{CacheConfig, DEFAULT_SIGNATURE_TIMEOUT};

/// Error type for configuration loading.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A variable holds an unusable value.
    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue {
        /// Variable name.
        var: &'static str,
        /// Offending value.
        value: String,
    },
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Human-readable multi-line output.
    Pretty,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(ConfigError::InvalidValue {
                var: "LOG_FORMAT",
                value: s.to_string(),
            }),
        }
    }
}

/// Settings shared by builder and evaluator sessions.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Bound on a single signing attempt.
    pub signature_timeout: Duration,
    /// Log output format.
    pub log_format: LogFormat,
    /// Resolved-key cache.
    pub key_cache: CacheConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            signature_timeout: DEFAULT_SIGNATURE_TIMEOUT,
            log_format: LogFormat::default(),
            key_cache: CacheConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load from the process environment; unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("CONTAINMENT_SIGNATURE_TIMEOUT_MS") {
            let millis: u64 = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                var: "CONTAINMENT_SIGNATURE_TIMEOUT_MS",
                value: value.clone(),
            })?;
            if millis == 0 {
                return Err(ConfigError::InvalidValue {
                    var: "CONTAINMENT_SIGNATURE_TIMEOUT_MS",
                    value,
                });
            }
            config.signature_timeout = Duration::from_millis(millis);
        }

        if let Some(value) = lookup("CONTAINMENT_KEY_CACHE_SIZE") {
            let entries: usize = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                var: "CONTAINMENT_KEY_CACHE_SIZE",
                value: value.clone(),
            })?;
            config.key_cache = CacheConfig {
                max_entries: entries,
                enabled: entries > 0,
            };
        }

        if let Some(value) = lookup("LOG_FORMAT") {
            config.log_format = value.parse()?;
        }

        Ok(config)
    }

    /// Override the signing timeout.
    pub fn with_signature_timeout(mut self, timeout: Duration) -> Self {
        self.signature_timeout = timeout;
        self
    }
}
