//! # permstore
//!
//! Hierarchical permission store. Permission names are colon-delimited paths
//! (`app:feature:action`), stored one row per node together with the chain of
//! ancestor ids. Lookups go through a local memo and an external cache, both
//! invalidated on every write.
//!
//! ```no_run
//! use permstore::{
//!     MemoryCache, PermissionStore, PermsConfig, SledPermissionTable, StoreConnections,
//! };
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let table = Arc::new(SledPermissionTable::open("perms.db")?);
//! let store = PermissionStore::new(
//!     PermsConfig::default(),
//!     StoreConnections::single(table),
//!     Arc::new(MemoryCache::default()),
//! )?;
//!
//! let mut app = store.create_new("calendar");
//! store.add(&mut app)?;
//! let mut events = store.create_new("calendar:events");
//! events.data_mut().add_user_permission("alice", permstore::PERMS_READ);
//! store.add(&mut events)?;
//!
//! assert_eq!(store.parent_of("calendar:events")?, app.id().unwrap());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod constants;
pub mod db_operations;
pub mod error;
pub mod permissions;

pub use cache::{CacheBackend, CacheFacade, LayeredCache, MemoryCache, NullCache};
pub use config::{error::ConfigError, MissingParentPolicy, PermsConfig};
pub use constants::ROOT_NAME;
pub use db_operations::{PermissionRow, PermissionTable, SledPermissionTable};
pub use error::{CacheError, PermsError, PermsResult, StorageError};
pub use permissions::types::{PERMS_ALL, PERMS_DELETE, PERMS_EDIT, PERMS_READ, PERMS_SHOW};
pub use permissions::{
    AncestorTree, ApplicationPermissions, ApplicationRegistry, DefaultReason, ParentChain,
    PermId, PermissionData, PermissionRecord, PermissionStore, RegistryError, StaticRegistry,
    StoreConnections, TypeResolution,
};
