//! Unified error handling for the permission store.
//!
//! `PermsError` is what every public store operation returns. The port-level
//! errors (`StorageError`, `CacheError`) are kept separate so backends do not
//! need to know about the store's taxonomy.

use crate::config::error::ConfigError;

/// Errors raised by a [`PermissionTable`](crate::db_operations::PermissionTable) backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The underlying engine failed (I/O, connection, transaction conflict).
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// A row with the same `perm_name` already exists.
    #[error("Unique constraint violated for permission '{name}'")]
    UniqueViolation { name: String },

    /// A row with the same `perm_id` already exists.
    #[error("Duplicate permission id {id}")]
    DuplicateId { id: i64 },

    /// Stored data could not be decoded.
    #[error("Corrupt permission data: {0}")]
    Corrupt(String),
}

impl StorageError {
    pub fn backend<S: Into<String>>(msg: S) -> Self {
        Self::Backend(msg.into())
    }

    pub fn corrupt<S: Into<String>>(msg: S) -> Self {
        Self::Corrupt(msg.into())
    }
}

impl From<sled::Error> for StorageError {
    fn from(error: sled::Error) -> Self {
        StorageError::Backend(error.to_string())
    }
}

/// Errors raised by a [`CacheBackend`](crate::cache::CacheBackend).
///
/// The store never propagates these; see [`CacheFacade`](crate::cache::CacheFacade).
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(String),
}

/// Error type returned by [`PermissionStore`](crate::permissions::PermissionStore).
#[derive(Debug, thiserror::Error)]
pub enum PermsError {
    /// No row for the requested name, id or parent.
    #[error("Permission not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Permission already exists: {0}")]
    AlreadyExists(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl PermsError {
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, PermsError::NotFound(_))
    }
}

/// Result type for permission store operations
pub type PermsResult<T> = Result<T, PermsError>;
