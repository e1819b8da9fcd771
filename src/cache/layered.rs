use super::CacheFacade;
use crate::error::PermsResult;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Clears every cache layer holding an entry for a key.
pub trait Invalidate: Send + Sync {
    fn invalidate(&self, key: &str);
}

/// Layer that answered a [`LayeredCache::get_or_load`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Local,
    Remote,
    Source,
}

/// Three-tier lookup: local memo, then the remote cache, then the source of
/// truth. A miss in one layer fills every layer above it.
pub struct LayeredCache<V> {
    local: Mutex<HashMap<String, V>>,
    remote: CacheFacade,
}

impl<V> LayeredCache<V>
where
    V: Clone + Serialize + DeserializeOwned + Send,
{
    pub fn new(remote: CacheFacade) -> Self {
        Self {
            local: Mutex::new(HashMap::new()),
            remote,
        }
    }

    pub fn remote(&self) -> &CacheFacade {
        &self.remote
    }

    /// Returns the value for `key`, calling `load` only when neither cache
    /// layer has it. Errors from `load` are returned and nothing is cached.
    pub fn get_or_load<F>(&self, key: &str, load: F) -> PermsResult<(V, Layer)>
    where
        F: FnOnce() -> PermsResult<V>,
    {
        if let Some(value) = self.local().get(key) {
            return Ok((value.clone(), Layer::Local));
        }

        if let Some(blob) = self.remote.get_content(key) {
            match serde_json::from_slice::<V>(&blob) {
                Ok(value) => {
                    self.local().insert(key.to_string(), value.clone());
                    return Ok((value, Layer::Remote));
                }
                Err(e) => log::warn!("Discarding undecodable cache entry for '{}': {}", key, e),
            }
        }

        let value = load()?;
        match serde_json::to_vec(&value) {
            Ok(blob) => self.remote.set_content(key, blob),
            Err(e) => log::warn!("Not caching '{}': {}", key, e),
        }
        self.local().insert(key.to_string(), value.clone());
        Ok((value, Layer::Source))
    }

    /// Drops the local memo only; the remote cache is left alone.
    pub fn clear_local(&self) {
        self.local().clear();
    }

    fn local(&self) -> MutexGuard<'_, HashMap<String, V>> {
        // A panic while holding the guard cannot leave the map half-updated.
        self.local
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<V> Invalidate for LayeredCache<V>
where
    V: Clone + Serialize + DeserializeOwned + Send,
{
    fn invalidate(&self, key: &str) {
        self.local().remove(key);
        self.remote.invalidate(key);
    }
}
