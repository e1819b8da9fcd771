//! Common test utilities and fixtures for the permission store tests.
//!
//! Provides temporary sled-backed stores, a table wrapper that counts the
//! queries reaching storage, and backends that always fail.

#![allow(dead_code)]

use permstore::{
    ApplicationPermissions, ApplicationRegistry, CacheBackend, CacheError, MemoryCache, PermId,
    PermissionRow, PermissionStore, PermissionTable, PermsConfig, RegistryError,
    SledPermissionTable, StorageError, StoreConnections,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A store over a temporary sled database and an in-memory cache.
pub struct StoreFixture {
    pub store: PermissionStore,
    pub table: Arc<CountingTable>,
    pub cache: Arc<MemoryCache>,
}

impl StoreFixture {
    pub fn new() -> Self {
        Self::with_config(PermsConfig::default())
    }

    pub fn with_config(config: PermsConfig) -> Self {
        init_logging();
        let sled = SledPermissionTable::temporary().expect("temporary sled database");
        let table = Arc::new(CountingTable::new(Arc::new(sled)));
        let cache = Arc::new(MemoryCache::new(256));
        let store = store_on(table.clone(), cache.clone(), config);
        Self {
            store,
            table,
            cache,
        }
    }

    /// Another store sharing this fixture's table and cache, with a fresh memo.
    pub fn sibling(&self, config: PermsConfig) -> PermissionStore {
        store_on(self.table.clone(), self.cache.clone(), config)
    }

    /// Adds `name` with default data and returns its id.
    pub fn add(&self, name: &str) -> PermId {
        let mut record = self.store.create_new(name);
        self.store.add(&mut record).expect("add permission")
    }
}

pub fn store_on(
    table: Arc<dyn PermissionTable>,
    cache: Arc<dyn CacheBackend>,
    config: PermsConfig,
) -> PermissionStore {
    PermissionStore::new(config, StoreConnections::single(table), cache).expect("valid store")
}

/// Delegating table that counts the read queries reaching storage.
pub struct CountingTable {
    inner: Arc<dyn PermissionTable>,
    reads: AtomicUsize,
    listings: AtomicUsize,
    /// Ids handed out by `next_id` before delegating to `inner`.
    forced_ids: std::sync::Mutex<Vec<PermId>>,
}

impl CountingTable {
    pub fn new(inner: Arc<dyn PermissionTable>) -> Self {
        Self {
            inner,
            reads: AtomicUsize::new(0),
            listings: AtomicUsize::new(0),
            forced_ids: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Full-table listings made so far.
    pub fn listings(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }

    /// Makes the next `next_id` calls return `ids`, in order.
    pub fn force_next_ids(&self, ids: &[PermId]) {
        let mut forced = self.forced_ids.lock().unwrap();
        forced.extend(ids.iter().rev().copied());
    }

    fn read(&self) {
        self.reads.fetch_add(1, Ordering::SeqCst);
    }
}

impl PermissionTable for CountingTable {
    fn row_by_name(&self, table: &str, name: &str) -> Result<Option<PermissionRow>, StorageError> {
        self.read();
        self.inner.row_by_name(table, name)
    }

    fn row_by_id(&self, table: &str, id: PermId) -> Result<Option<PermissionRow>, StorageError> {
        self.read();
        self.inner.row_by_id(table, id)
    }

    fn count_by_name(&self, table: &str, name: &str) -> Result<u64, StorageError> {
        self.read();
        self.inner.count_by_name(table, name)
    }

    fn id_and_names_ordered(&self, table: &str) -> Result<Vec<(PermId, String)>, StorageError> {
        self.read();
        self.listings.fetch_add(1, Ordering::SeqCst);
        self.inner.id_and_names_ordered(table)
    }

    fn names_with_prefix(&self, table: &str, prefix: &str) -> Result<Vec<String>, StorageError> {
        self.read();
        self.inner.names_with_prefix(table, prefix)
    }

    fn next_id(&self, table: &str) -> Result<PermId, StorageError> {
        if let Some(id) = self.forced_ids.lock().unwrap().pop() {
            return Ok(id);
        }
        self.inner.next_id(table)
    }

    fn insert(&self, table: &str, row: &PermissionRow) -> Result<(), StorageError> {
        self.inner.insert(table, row)
    }

    fn update_data(&self, table: &str, id: PermId, data: &str) -> Result<bool, StorageError> {
        self.inner.update_data(table, id, data)
    }

    fn delete_by_name(&self, table: &str, name: &str) -> Result<u64, StorageError> {
        self.inner.delete_by_name(table, name)
    }

    fn delete_by_name_like(&self, table: &str, pattern: &str) -> Result<u64, StorageError> {
        self.inner.delete_by_name_like(table, pattern)
    }
}

/// Table whose every query fails.
pub struct FailingTable;

impl FailingTable {
    fn fail<T>() -> Result<T, StorageError> {
        Err(StorageError::backend("connection refused"))
    }
}

impl PermissionTable for FailingTable {
    fn row_by_name(&self, _: &str, _: &str) -> Result<Option<PermissionRow>, StorageError> {
        Self::fail()
    }
    fn row_by_id(&self, _: &str, _: PermId) -> Result<Option<PermissionRow>, StorageError> {
        Self::fail()
    }
    fn count_by_name(&self, _: &str, _: &str) -> Result<u64, StorageError> {
        Self::fail()
    }
    fn id_and_names_ordered(&self, _: &str) -> Result<Vec<(PermId, String)>, StorageError> {
        Self::fail()
    }
    fn names_with_prefix(&self, _: &str, _: &str) -> Result<Vec<String>, StorageError> {
        Self::fail()
    }
    fn next_id(&self, _: &str) -> Result<PermId, StorageError> {
        Self::fail()
    }
    fn insert(&self, _: &str, _: &PermissionRow) -> Result<(), StorageError> {
        Self::fail()
    }
    fn update_data(&self, _: &str, _: PermId, _: &str) -> Result<bool, StorageError> {
        Self::fail()
    }
    fn delete_by_name(&self, _: &str, _: &str) -> Result<u64, StorageError> {
        Self::fail()
    }
    fn delete_by_name_like(&self, _: &str, _: &str) -> Result<u64, StorageError> {
        Self::fail()
    }
}

/// Cache backend that is always down.
pub struct BrokenCache;

impl CacheBackend for BrokenCache {
    fn get(&self, _: &str, _: u64) -> Result<Option<Vec<u8>>, CacheError> {
        Err(CacheError::Backend("cache offline".to_string()))
    }
    fn set(&self, _: &str, _: Vec<u8>) -> Result<(), CacheError> {
        Err(CacheError::Backend("cache offline".to_string()))
    }
    fn expire(&self, _: &str) -> Result<(), CacheError> {
        Err(CacheError::Backend("cache offline".to_string()))
    }
}

/// Registry whose lookups always fail.
pub struct FailingRegistry;

impl ApplicationRegistry for FailingRegistry {
    fn application_permissions(&self, app: &str) -> Result<ApplicationPermissions, RegistryError> {
        Err(RegistryError::Backend(format!("cannot load {}", app)))
    }
}
