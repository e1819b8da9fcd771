//! Cache layer for permission lookups.
//!
//! * [`CacheBackend`] is the port to an external key/value cache.
//! * [`CacheFacade`] namespaces keys with a prefix and version and makes the
//!   fail-open policy explicit.
//! * [`LayeredCache`] stacks a local memo on top of the facade and a source
//!   of truth below it.

mod facade;
mod layered;
mod memory;

pub use facade::CacheFacade;
pub use layered::{Invalidate, Layer, LayeredCache};
pub use memory::{MemoryCache, NullCache};

use crate::error::CacheError;

/// Port to an external cache with expiry.
///
/// Values are opaque blobs. Eviction is entirely up to the implementation.
pub trait CacheBackend: Send + Sync {
    /// Returns the value stored under `key` unless it is older than
    /// `ttl_secs`. A `ttl_secs` of zero means no age limit.
    fn get(&self, key: &str, ttl_secs: u64) -> Result<Option<Vec<u8>>, CacheError>;

    fn set(&self, key: &str, value: Vec<u8>) -> Result<(), CacheError>;

    fn expire(&self, key: &str) -> Result<(), CacheError>;
}
