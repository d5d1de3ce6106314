//! Invoker configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use judge_protocol::{PROTOCOL_MAX, PROTOCOL_MIN};

/// Errors loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Invoker configuration settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvokerConfig {
    /// Address reported to the master in status.
    pub address: String,
    /// Fallback log filter when `RUST_LOG` is unset.
    pub log_level: String,
    pub cache: CacheConfig,
    pub storage: StorageConfig,
    pub capacity: CapacityConfig,
    /// Minimum supported protocol version.
    #[serde(skip)]
    pub protocol_min: i32,
    /// Maximum supported protocol version.
    #[serde(skip)]
    pub protocol_max: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache root. Cleared on start-up.
    pub path: PathBuf,
    /// Total size budget of resident artifacts.
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root of the filesystem storage connector.
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityConfig {
    pub threads: usize,
    pub sandboxes: usize,
    /// Jobs accepted beyond `sandboxes` while all of them are busy.
    pub queue_size: usize,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            address: "localhost:7070".to_string(),
            log_level: "info".to_string(),
            cache: CacheConfig::default(),
            storage: StorageConfig::default(),
            capacity: CapacityConfig::default(),
            protocol_min: PROTOCOL_MIN,
            protocol_max: PROTOCOL_MAX,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/judge/invoker_cache"),
            size_bytes: 1024 * 1024 * 1024, // 1 GB
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/judge/storage"),
        }
    }
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            sandboxes: 4,
            queue_size: 4,
        }
    }
}

impl InvokerConfig {
    /// Load and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: InvokerConfig = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.address.trim().is_empty() {
            return Err(ConfigError::Invalid("address must not be empty".to_string()));
        }
        if self.cache.size_bytes == 0 {
            return Err(ConfigError::Invalid("cache.size_bytes must be positive".to_string()));
        }
        if self.capacity.sandboxes == 0 {
            return Err(ConfigError::Invalid("capacity.sandboxes must be positive".to_string()));
        }
        if self.cache.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("cache.path must not be empty".to_string()));
        }
        if self.storage.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("storage.path must not be empty".to_string()));
        }
        Ok(())
    }

    /// Apply command-line path overrides and validate the result.
    pub fn with_overrides(
        mut self,
        cache_path: Option<PathBuf>,
        storage_path: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        if let Some(path) = cache_path {
            self.cache.path = path;
        }
        if let Some(path) = storage_path {
            self.storage.path = path;
        }
        self.validate()?;
        Ok(self)
    }

    /// Number of jobs the invoker holds at once.
    pub fn job_capacity(&self) -> usize {
        self.capacity.sandboxes + self.capacity.queue_size
    }
}
