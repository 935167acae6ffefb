//! Configuration management
//!
//! Handles TOML configuration parsing and validation. Every field has a
//! default, so a missing file or a partial file is valid.
//!
//! ```toml
//! [runner]
//! max_concurrency = 10
//! drain_on_cancel = false
//!
//! [cache]
//! enabled = true
//! ttl_seconds = 60.0
//! max_size = 128
//!
//! [output]
//! progress = true
//! log_level = "warn"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::CommandCache;
use crate::constants::{
    APP_NAME, CACHE_TTL_MAX_SECS, CONFIG_FILE_NAME, DEFAULT_CACHE_MAX_SIZE, DEFAULT_CACHE_TTL_SECS,
    DEFAULT_MAX_CONCURRENCY, MAX_CONCURRENCY_LIMIT,
};
use crate::document::{load_document, DocumentError};
use crate::logging::{is_valid_level, LOG_LEVELS};
use crate::runner::{normalize_concurrency, RunnerConfig};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid max_concurrency: {0}. Must be between 1 and 1024")]
    InvalidConcurrency(i64),
    #[error("Invalid ttl_seconds: {0}. Must be greater than 0 and at most 86400")]
    InvalidTtl(f64),
    #[error("Invalid max_size: {0}. Must be at least 1")]
    InvalidCacheSize(usize),
    #[error("Invalid log_level: '{level}'. Expected one of {expected:?}")]
    InvalidLogLevel {
        level: String,
        expected: &'static [&'static str],
    },
    #[error("could not determine the user configuration directory")]
    NoConfigDir,
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Configuration {
    pub runner: RunnerSettings,
    pub cache: CacheSettings,
    pub output: OutputSettings,
}

/// Scheduler settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerSettings {
    /// Worker pool size (1-1024)
    pub max_concurrency: i64,
    /// Report queued jobs as skipped after cancellation
    pub drain_on_cancel: bool,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY as i64,
            drain_on_cancel: false,
        }
    }
}

/// Per-device command cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSettings {
    pub enabled: bool,
    /// Freshness window in seconds (0-86400, exclusive of 0)
    pub ttl_seconds: f64,
    /// Resident entries per device
    pub max_size: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: DEFAULT_CACHE_TTL_SECS,
            max_size: DEFAULT_CACHE_MAX_SIZE,
        }
    }
}

/// Reporting settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputSettings {
    /// Draw a progress line on stderr during the run
    pub progress: bool,
    pub log_level: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            progress: true,
            log_level: "warn".to_string(),
        }
    }
}

impl Configuration {
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let config: Configuration = load_document(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Configuration = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `explicit` if given (it must exist), otherwise the default path
    /// if present, otherwise the defaults
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_from_file(path);
        }

        match Self::default_config_path() {
            Ok(path) if path.exists() => {
                log::debug!("Loading configuration from {}", path.display());
                Self::load_from_file(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    /// `<config_dir>/netverify/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_NAME).join(CONFIG_FILE_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let concurrency = self.runner.max_concurrency;
        if concurrency < 1 || concurrency > MAX_CONCURRENCY_LIMIT as i64 {
            return Err(ConfigError::InvalidConcurrency(concurrency));
        }

        let ttl = self.cache.ttl_seconds;
        if !(ttl > 0.0 && ttl <= CACHE_TTL_MAX_SECS) {
            return Err(ConfigError::InvalidTtl(ttl));
        }

        if self.cache.max_size == 0 {
            return Err(ConfigError::InvalidCacheSize(self.cache.max_size));
        }

        if !is_valid_level(&self.output.log_level) {
            return Err(ConfigError::InvalidLogLevel {
                level: self.output.log_level.clone(),
                expected: LOG_LEVELS,
            });
        }

        Ok(())
    }

    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            max_concurrency: normalize_concurrency(self.runner.max_concurrency),
            drain_on_cancel: self.runner.drain_on_cancel,
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs_f64(self.cache.ttl_seconds.clamp(0.0, CACHE_TTL_MAX_SECS))
    }

    /// One cache shared by `devices` devices, holding up to `max_size`
    /// entries per device; `None` when caching is disabled
    pub fn make_cache(&self, devices: usize) -> Option<Arc<CommandCache>> {
        let capacity = self.cache.max_size.saturating_mul(devices.max(1));
        self.cache
            .enabled
            .then(|| Arc::new(CommandCache::new(self.cache_ttl(), capacity)))
    }
}
