//! Configuration management
//!
//! The tool persists a handful of settings, chiefly the selected bucket, in a
//! TOML file at `~/.config/sync-tool/config.toml`. The location can be moved
//! with the `SYNC_TOOL_CONFIG_DIR` environment variable.
//!
//! Callers outside this module talk to configuration through the
//! [`ConfigStore`] key-value trait so the sync engine never touches the file
//! directly.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Current configuration schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_ENV: &str = "SYNC_TOOL_CONFIG_DIR";

/// Key holding the selected bucket
pub const KEY_BUCKET_NAME: &str = "bucket_name";
/// Key holding the AWS region override
pub const KEY_REGION: &str = "region";
/// Key holding a custom endpoint URL (S3-compatible services)
pub const KEY_ENDPOINT: &str = "endpoint";
/// Key holding the storage class applied to uploads
pub const KEY_STORAGE_CLASS: &str = "storage_class";

/// Default storage class for uploaded objects
pub const DEFAULT_STORAGE_CLASS: &str = "ONEZONE_IA";

const MIB: u64 = 1024 * 1024;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Schema version for migration support
    pub schema_version: u32,

    /// Bucket that `upload` syncs into
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_name: Option<String>,

    /// Region override; falls back to the AWS environment when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Endpoint override for S3-compatible services
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Storage class hint sent with every upload
    #[serde(default = "default_storage_class")]
    pub storage_class: String,

    /// Transfer tuning
    #[serde(default)]
    pub transfer: TransferSettings,
}

/// Transfer tuning persisted in the `[transfer]` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferSettings {
    /// Files at or above this size use multipart upload
    #[serde(default = "default_multipart_threshold")]
    pub multipart_threshold: u64,

    /// Size of each multipart part
    #[serde(default = "default_multipart_chunk_size")]
    pub multipart_chunk_size: u64,

    /// Maximum uploads (or parts) in flight
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_storage_class() -> String {
    DEFAULT_STORAGE_CLASS.to_string()
}

fn default_multipart_threshold() -> u64 {
    25 * MIB
}

fn default_multipart_chunk_size() -> u64 {
    25 * MIB
}

fn default_max_concurrency() -> usize {
    10
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            multipart_threshold: default_multipart_threshold(),
            multipart_chunk_size: default_multipart_chunk_size(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            bucket_name: None,
            region: None,
            endpoint: None,
            storage_class: default_storage_class(),
            transfer: TransferSettings::default(),
        }
    }
}

impl Config {
    fn get_key(&self, key: &str) -> Result<Option<String>> {
        match key {
            KEY_BUCKET_NAME => Ok(self.bucket_name.clone()),
            KEY_REGION => Ok(self.region.clone()),
            KEY_ENDPOINT => Ok(self.endpoint.clone()),
            KEY_STORAGE_CLASS => Ok(Some(self.storage_class.clone())),
            other => Err(Error::Config(format!("Unknown configuration key: {other}"))),
        }
    }

    fn set_key(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        if value.is_empty() {
            return Err(Error::Config(format!("Value for '{key}' cannot be empty")));
        }

        match key {
            KEY_BUCKET_NAME => self.bucket_name = Some(value.to_string()),
            KEY_REGION => self.region = Some(value.to_string()),
            KEY_ENDPOINT => self.endpoint = Some(value.to_string()),
            KEY_STORAGE_CLASS => self.storage_class = value.to_string(),
            other => {
                return Err(Error::Config(format!("Unknown configuration key: {other}")));
            }
        }
        Ok(())
    }
}

/// Key-value view over persisted configuration
pub trait ConfigStore: Send + Sync {
    /// Read a value; `Ok(None)` when the key is known but unset
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Persist a value
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Configuration manager handles loading and saving config
#[derive(Debug)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the default config path
    ///
    /// Honors `SYNC_TOOL_CONFIG_DIR` when set.
    pub fn new() -> Result<Self> {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
            return Ok(Self::with_path(PathBuf::from(dir).join("config.toml")));
        }

        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not determine config directory".into()))?;
        let config_path = config_dir.join("sync-tool").join("config.toml");
        Ok(Self { config_path })
    }

    /// Create a ConfigManager with a custom path (useful for testing)
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the configuration file path
    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Load configuration from disk
    ///
    /// A missing file yields the default configuration.
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&self.config_path).map_err(|e| {
            Error::Config(format!(
                "Failed to read {}: {e}",
                self.config_path.display()
            ))
        })?;
        let mut config: Config = toml::from_str(&content)?;

        if config.schema_version < SCHEMA_VERSION {
            config = self.migrate(config);
        } else if config.schema_version > SCHEMA_VERSION {
            return Err(Error::Config(format!(
                "Configuration file version {} is newer than supported version {}. Please upgrade sync-tool.",
                config.schema_version, SCHEMA_VERSION
            )));
        }

        Ok(config)
    }

    /// Save configuration to disk
    ///
    /// Creates parent directories and restricts the file to its owner on Unix.
    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(config)?;
        std::fs::write(&self.config_path, content).map_err(|e| {
            Error::Config(format!(
                "Failed to write {}: {e}",
                self.config_path.display()
            ))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.config_path, permissions)?;
        }

        tracing::debug!(path = %self.config_path.display(), "configuration saved");
        Ok(())
    }

    fn migrate(&self, mut config: Config) -> Config {
        // Schema 1 is the first release; nothing to rewrite yet.
        config.schema_version = SCHEMA_VERSION;
        config
    }
}

impl ConfigStore for ConfigManager {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.load()?.get_key(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut config = self.load()?;
        config.set_key(key, value)?;
        self.save(&config)
    }
}

/// In-memory [`ConfigStore`], for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with a bucket already selected
    pub fn with_bucket(bucket: impl Into<String>) -> Self {
        let store = Self::new();
        store
            .values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(KEY_BUCKET_NAME.to_string(), bucket.into());
        store
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self
            .values
            .lock()
            .map_err(|_| Error::Config("configuration lock poisoned".into()))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| Error::Config("configuration lock poisoned".into()))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
