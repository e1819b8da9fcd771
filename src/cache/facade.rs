use super::CacheBackend;
use std::sync::Arc;

/// Namespaced, fail-open view of a [`CacheBackend`].
///
/// Keys embed the cache version, so entries written under another version
/// are simply never looked up. Backend errors never reach the caller: reads
/// that fail are misses, writes and expiries that fail are logged and dropped.
#[derive(Clone)]
pub struct CacheFacade {
    backend: Arc<dyn CacheBackend>,
    prefix: String,
    version: u32,
    lifetime_secs: u64,
}

impl CacheFacade {
    pub fn new<S: Into<String>>(
        backend: Arc<dyn CacheBackend>,
        prefix: S,
        version: u32,
        lifetime_secs: u64,
    ) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
            version,
            lifetime_secs,
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Key of the serialized record for `name`.
    pub fn content_key(&self, name: &str) -> String {
        format!("{}{}{}", self.prefix, self.version, name)
    }

    /// Key of the cached row count for `name`.
    pub fn exists_key(&self, name: &str) -> String {
        format!("{}_exists_{}{}", self.prefix, self.version, name)
    }

    pub fn get_content(&self, name: &str) -> Option<Vec<u8>> {
        self.get(&self.content_key(name))
    }

    pub fn set_content(&self, name: &str, value: Vec<u8>) {
        self.set(&self.content_key(name), value);
    }

    /// Cached row count for `name`; `None` on a miss, which is distinct from
    /// a cached count of zero.
    pub fn get_exists(&self, name: &str) -> Option<u64> {
        let key = self.exists_key(name);
        let raw = self.get(&key)?;
        match std::str::from_utf8(&raw).ok().and_then(|s| s.parse().ok()) {
            Some(count) => Some(count),
            None => {
                log::warn!("Ignoring malformed existence entry under '{}'", key);
                None
            }
        }
    }

    pub fn set_exists(&self, name: &str, count: u64) {
        self.set(&self.exists_key(name), count.to_string().into_bytes());
    }

    /// Expires both the content and existence entries for `name`.
    pub fn invalidate(&self, name: &str) {
        self.expire(&self.content_key(name));
        self.expire(&self.exists_key(name));
    }

    fn get(&self, key: &str) -> Option<Vec<u8>> {
        match self.backend.get(key, self.lifetime_secs) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("Cache read for '{}' failed, treating as miss: {}", key, e);
                None
            }
        }
    }

    fn set(&self, key: &str, value: Vec<u8>) {
        if let Err(e) = self.backend.set(key, value) {
            log::warn!("Cache write for '{}' failed: {}", key, e);
        }
    }

    fn expire(&self, key: &str) {
        if let Err(e) = self.backend.expire(key) {
            log::warn!("Cache expiry for '{}' failed: {}", key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::error::CacheError;

    struct BrokenCache;

    impl CacheBackend for BrokenCache {
        fn get(&self, _key: &str, _ttl_secs: u64) -> Result<Option<Vec<u8>>, CacheError> {
            Err(CacheError::Backend("down".to_string()))
        }
        fn set(&self, _key: &str, _value: Vec<u8>) -> Result<(), CacheError> {
            Err(CacheError::Backend("down".to_string()))
        }
        fn expire(&self, _key: &str) -> Result<(), CacheError> {
            Err(CacheError::Backend("down".to_string()))
        }
    }

    #[test]
    fn test_key_layout() {
        let facade = CacheFacade::new(Arc::new(MemoryCache::new(8)), "perm_sql", 2, 0);
        assert_eq!(facade.content_key("app:x"), "perm_sql2app:x");
        assert_eq!(facade.exists_key("app:x"), "perm_sql_exists_2app:x");
    }

    #[test]
    fn test_exists_distinguishes_zero_from_miss() {
        let facade = CacheFacade::new(Arc::new(MemoryCache::new(8)), "p", 1, 0);
        assert_eq!(facade.get_exists("a"), None);
        facade.set_exists("a", 0);
        assert_eq!(facade.get_exists("a"), Some(0));
        facade.invalidate("a");
        assert_eq!(facade.get_exists("a"), None);
    }

    #[test]
    fn test_versions_do_not_share_entries() {
        let backend: Arc<dyn CacheBackend> = Arc::new(MemoryCache::new(8));
        let v1 = CacheFacade::new(Arc::clone(&backend), "p", 1, 0);
        let v2 = CacheFacade::new(backend, "p", 2, 0);
        v1.set_content("a", b"old".to_vec());
        assert_eq!(v1.get_content("a"), Some(b"old".to_vec()));
        assert_eq!(v2.get_content("a"), None);
    }

    #[test]
    fn test_backend_failures_fail_open() {
        let facade = CacheFacade::new(Arc::new(BrokenCache), "p", 1, 0);
        facade.set_content("a", b"x".to_vec());
        facade.invalidate("a");
        assert_eq!(facade.get_content("a"), None);
        assert_eq!(facade.get_exists("a"), None);
    }
}
