//! Configuration loading for mesh-client.
//!
//! Configuration is loaded from a TOML file (default: `edumesh.toml`).
//! Every field has a default, so an empty file is valid.

use mesh_core::{Backoff, RetryPolicy, DEFAULT_CHUNK_SIZE};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration for an EduMesh client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientConfig {
    /// Peer transfer configuration.
    #[serde(default)]
    pub transfer: TransferConfig,
    /// Sync queue configuration.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Local storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Peer transfer configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TransferConfig {
    /// Bytes per chunk message (default: 16384).
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Pause between chunk sends in milliseconds (default: 10).
    #[serde(default = "default_send_interval_ms")]
    pub send_interval_ms: u64,
}

/// Backoff schedule names accepted in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    /// Retry on every drain.
    #[default]
    None,
    /// Exponential delay between `base_delay_ms` and `max_delay_ms`.
    Exponential,
}

/// Sync queue configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Attempts before an item is parked (default: unbounded).
    pub max_attempts: Option<u32>,
    /// Delay schedule between attempts (default: none).
    #[serde(default)]
    pub backoff: BackoffKind,
    /// First backoff delay in milliseconds (default: 1000).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Longest backoff delay in milliseconds (default: 300000 = 5 minutes).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to SQLite database file, relative to the data directory.
    #[serde(default = "default_database_path")]
    pub database: PathBuf,
}

// Default value functions
fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_send_interval_ms() -> u64 {
    10
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    5 * 60 * 1000 // 5 minutes
}

fn default_database_path() -> PathBuf {
    PathBuf::from("edumesh.db")
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            send_interval_ms: default_send_interval_ms(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_attempts: None,
            backoff: BackoffKind::None,
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: default_database_path(),
        }
    }
}

impl TransferConfig {
    /// Pause between chunk sends.
    pub fn send_interval(&self) -> Duration {
        Duration::from_millis(self.send_interval_ms)
    }

    /// Set the chunk size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set the pause between chunk sends.
    pub fn with_send_interval_ms(mut self, ms: u64) -> Self {
        self.send_interval_ms = ms;
        self
    }
}

impl SyncConfig {
    /// The retry policy this configuration describes.
    pub fn retry_policy(&self) -> RetryPolicy {
        let backoff = match self.backoff {
            BackoffKind::None => Backoff::None,
            BackoffKind::Exponential => Backoff::Exponential {
                base_ms: self.base_delay_ms,
                max_ms: self.max_delay_ms,
            },
        };
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff,
        }
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if a value
    /// is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::from_toml(&content).map_err(|e| match e {
            ConfigError::ParseError { source, .. } => ConfigError::ParseError {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::new(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transfer.chunk_size == 0 {
            return Err(ConfigError::Invalid(
                "transfer.chunk_size must be greater than zero".into(),
            ));
        }
        if self.sync.max_attempts == Some(0) {
            return Err(ConfigError::Invalid(
                "sync.max_attempts must be at least 1 when set".into(),
            ));
        }
        if self.sync.base_delay_ms > self.sync.max_delay_ms {
            return Err(ConfigError::Invalid(
                "sync.base_delay_ms must not exceed sync.max_delay_ms".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
