//! Configuration management

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_API_BASE_URL, DEFAULT_BATCH_SIZE, DEFAULT_EXTENSION_ORIGIN, DEFAULT_FLUSH_INTERVAL_MS,
    DEFAULT_MAX_RETRY, DEFAULT_REQUEST_TIMEOUT,
};
use crate::errors::{MindhitError, Result};

/// Host configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub queue: QueueConfig,
    pub storage: StorageConfig,
    pub extension: ExtensionConfig,
    pub connectivity: ConnectivityConfig,
    pub logging: LoggingConfig,
}

/// Remote events API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

/// Batching and retry behaviour of the event queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub batch_size: usize,
    pub flush_interval_ms: u64,
    pub max_retry: u32,
}

/// Durable key-value storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite file path; `None` keeps everything in memory.
    pub path: Option<String>,
    pub pool_size: u32,
}

/// Which senders may drive the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtensionConfig {
    pub allowed_origins: Vec<String>,
}

/// Periodic health probe used as a connectivity signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    pub probe_enabled: bool,
    pub probe_interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout_secs: DEFAULT_REQUEST_TIMEOUT.as_secs(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            max_retry: DEFAULT_MAX_RETRY,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { path: Some("mindhit.db".to_string()), pool_size: 4 }
    }
}

impl Default for ExtensionConfig {
    fn default() -> Self {
        Self { allowed_origins: vec![DEFAULT_EXTENSION_ORIGIN.to_string()] }
    }
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self { probe_enabled: false, probe_interval_secs: 60 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl QueueConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

impl ConnectivityConfig {
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }
}

impl Config {
    /// Check that the configuration can drive a working pipeline.
    ///
    /// # Errors
    /// Returns `MindhitError::Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(MindhitError::Config("api.base_url must not be empty".into()));
        }
        if self.api.timeout_secs == 0 {
            return Err(MindhitError::Config("api.timeout_secs must be positive".into()));
        }
        if self.queue.batch_size == 0 {
            return Err(MindhitError::Config("queue.batch_size must be positive".into()));
        }
        if self.queue.flush_interval_ms == 0 {
            return Err(MindhitError::Config("queue.flush_interval_ms must be positive".into()));
        }
        if self.queue.max_retry == 0 {
            return Err(MindhitError::Config("queue.max_retry must be positive".into()));
        }
        if self.storage.pool_size == 0 {
            return Err(MindhitError::Config("storage.pool_size must be positive".into()));
        }
        if self.extension.allowed_origins.iter().all(|origin| origin.trim().is_empty()) {
            return Err(MindhitError::Config(
                "extension.allowed_origins must name at least one origin".into(),
            ));
        }
        if self.connectivity.probe_enabled && self.connectivity.probe_interval_secs == 0 {
            return Err(MindhitError::Config(
                "connectivity.probe_interval_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}
