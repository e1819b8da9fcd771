use super::CacheBackend;
use crate::constants::DEFAULT_MEMORY_CACHE_CAPACITY;
use crate::error::CacheError;
use chrono::{DateTime, Utc};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

struct CachedEntry {
    data: Vec<u8>,
    stored_at: DateTime<Utc>,
}

impl CachedEntry {
    fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            stored_at: Utc::now(),
        }
    }

    fn is_older_than(&self, ttl_secs: u64) -> bool {
        if ttl_secs == 0 {
            return false;
        }
        let ttl = i64::try_from(ttl_secs).unwrap_or(i64::MAX);
        Utc::now().signed_duration_since(self.stored_at).num_seconds() > ttl
    }
}

/// In-process LRU cache backend.
///
/// Entries older than the TTL passed to `get` are dropped on access.
pub struct MemoryCache {
    entries: Mutex<LruCache<String, CachedEntry>>,
}

impl MemoryCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, LruCache<String, CachedEntry>>, CacheError> {
        self.entries
            .lock()
            .map_err(|_| CacheError::Backend("memory cache lock poisoned".to_string()))
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_CACHE_CAPACITY)
    }
}

impl CacheBackend for MemoryCache {
    fn get(&self, key: &str, ttl_secs: u64) -> Result<Option<Vec<u8>>, CacheError> {
        let mut entries = self.lock()?;
        let expired = match entries.get(key) {
            Some(entry) if !entry.is_older_than(ttl_secs) => return Ok(Some(entry.data.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        Ok(None)
    }

    fn set(&self, key: &str, value: Vec<u8>) -> Result<(), CacheError> {
        self.lock()?.put(key.to_string(), CachedEntry::new(value));
        Ok(())
    }

    fn expire(&self, key: &str) -> Result<(), CacheError> {
        self.lock()?.pop(key);
        Ok(())
    }
}

/// Backend that stores nothing; every read is a miss.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCache;

impl CacheBackend for NullCache {
    fn get(&self, _key: &str, _ttl_secs: u64) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: Vec<u8>) -> Result<(), CacheError> {
        Ok(())
    }

    fn expire(&self, _key: &str) -> Result<(), CacheError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_expire() {
        let cache = MemoryCache::new(4);
        cache.set("k", b"v".to_vec()).unwrap();
        assert_eq!(cache.get("k", 0).unwrap(), Some(b"v".to_vec()));
        cache.expire("k").unwrap();
        assert_eq!(cache.get("k", 0).unwrap(), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_stale_entries_are_dropped() {
        let cache = MemoryCache::new(4);
        cache.lock().unwrap().put(
            "old".to_string(),
            CachedEntry {
                data: b"v".to_vec(),
                stored_at: Utc::now() - chrono::Duration::seconds(120),
            },
        );
        assert_eq!(cache.get("old", 0).unwrap(), Some(b"v".to_vec()));
        assert_eq!(cache.get("old", 60).unwrap(), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_capacity_evicts_least_recent() {
        let cache = MemoryCache::new(2);
        cache.set("a", vec![1]).unwrap();
        cache.set("b", vec![2]).unwrap();
        cache.get("a", 0).unwrap();
        cache.set("c", vec![3]).unwrap();
        assert_eq!(cache.get("b", 0).unwrap(), None);
        assert_eq!(cache.get("a", 0).unwrap(), Some(vec![1]));
    }

    #[test]
    fn test_null_cache_always_misses() {
        let cache = NullCache;
        cache.set("k", vec![1]).unwrap();
        assert_eq!(cache.get("k", 0).unwrap(), None);
    }
}
