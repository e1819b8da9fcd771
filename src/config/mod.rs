//! Configuration for the permission store.
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration:
//!
//! ```toml
//! table = "perms"
//! cache_prefix = "perm_sql"
//! cache_version = 2
//! default_lifetime_secs = 86400
//! read_your_writes = true
//! missing_parent = "reject"
//! max_add_attempts = 3
//! ```

pub mod error;

use crate::constants::{
    DEFAULT_CACHE_LIFETIME_SECS, DEFAULT_CACHE_PREFIX, DEFAULT_CACHE_VERSION,
    DEFAULT_MAX_ADD_ATTEMPTS, DEFAULT_TABLE,
};
use error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What `add` does when a permission's named parent has no row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingParentPolicy {
    /// Fail the insert with `NotFound`.
    #[default]
    Reject,
    /// Store the permission with an empty parent chain, directly under root.
    AttachToRoot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermsConfig {
    /// Table (sled tree prefix) holding the permission rows.
    pub table: String,
    /// Namespace prepended to every cache key.
    pub cache_prefix: String,
    /// Schema tag embedded in cache keys.
    pub cache_version: u32,
    /// TTL handed to the cache backend on reads. Zero means no limit.
    pub default_lifetime_secs: u64,
    /// Route reads to the write connection so a store always sees its own writes.
    pub read_your_writes: bool,
    pub missing_parent: MissingParentPolicy,
    /// Attempts at allocating a free id before `add` gives up.
    pub max_add_attempts: u32,
}

impl Default for PermsConfig {
    fn default() -> Self {
        Self {
            table: DEFAULT_TABLE.to_string(),
            cache_prefix: DEFAULT_CACHE_PREFIX.to_string(),
            cache_version: DEFAULT_CACHE_VERSION,
            default_lifetime_secs: DEFAULT_CACHE_LIFETIME_SECS,
            read_your_writes: true,
            missing_parent: MissingParentPolicy::default(),
            max_add_attempts: DEFAULT_MAX_ADD_ATTEMPTS,
        }
    }
}

impl PermsConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: PermsConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        log::debug!("Loading permission store configuration from {}", path.display());
        std::fs::read_to_string(path)
            .map_err(ConfigError::from)
            .and_then(|content| Self::from_toml_str(&content))
            .map_err(|e| {
                log::error!("{} ({})", e.user_message(), path.display());
                e
            })
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.table.trim().is_empty() {
            return Err(ConfigError::validation("table must not be empty"));
        }
        if self.cache_prefix.is_empty() {
            return Err(ConfigError::validation("cache_prefix must not be empty"));
        }
        if self.max_add_attempts == 0 {
            return Err(ConfigError::validation(
                "max_add_attempts must be at least 1",
            ));
        }
        Ok(())
    }

    pub fn with_table<S: Into<String>>(mut self, table: S) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_cache_version(mut self, version: u32) -> Self {
        self.cache_version = version;
        self
    }

    pub fn with_read_your_writes(mut self, enabled: bool) -> Self {
        self.read_your_writes = enabled;
        self
    }

    pub fn with_missing_parent(mut self, policy: MissingParentPolicy) -> Self {
        self.missing_parent = policy;
        self
    }
}
