//! Hierarchical permission store.
//!
//! Permissions live in one table, one row per node. The hierarchy is encoded
//! twice: in the colon-delimited name (`app:feature:action`) and in the
//! `perm_parents` chain of ancestor ids. Root is implicit and never stored.
//!
//! Reads go through a [`LayeredCache`]; every mutation invalidates the
//! affected names in all layers instead of updating them.
//!
//! Reads and writes may use different connections. Unless
//! `read_your_writes` is enabled, a write is not guaranteed to be visible to
//! a read issued right after it.

use crate::cache::{CacheBackend, CacheFacade, Invalidate, Layer, LayeredCache};
use crate::config::{MissingParentPolicy, PermsConfig};
use crate::constants::ROOT_NAME;
use crate::db_operations::{PermissionRow, PermissionTable};
use crate::error::{PermsError, PermsResult, StorageError};
use crate::permissions::path_codec::{
    self, child_prefix, child_wildcard, parent_name, strip_root_prefix, AncestorTree, ParentChain,
};
use crate::permissions::record::{PermissionRecord, WriteHandle};
use crate::permissions::registry::{resolve_type, ApplicationRegistry, TypeResolution};
use crate::permissions::types::{PermId, PermissionData};
use std::sync::Arc;

/// Read and write connections used by a [`PermissionStore`].
#[derive(Clone)]
pub struct StoreConnections {
    read: Arc<dyn PermissionTable>,
    write: Arc<dyn PermissionTable>,
}

impl StoreConnections {
    /// One connection for both reads and writes.
    pub fn single(table: Arc<dyn PermissionTable>) -> Self {
        Self {
            read: Arc::clone(&table),
            write: table,
        }
    }

    /// Separate read (e.g. replica) and write (primary) connections.
    pub fn split(read: Arc<dyn PermissionTable>, write: Arc<dyn PermissionTable>) -> Self {
        Self { read, write }
    }
}

pub struct PermissionStore {
    config: PermsConfig,
    read: Arc<dyn PermissionTable>,
    write: Arc<dyn PermissionTable>,
    cache: Arc<LayeredCache<PermissionRecord>>,
    registry: Option<Arc<dyn ApplicationRegistry>>,
}

impl PermissionStore {
    pub fn new(
        config: PermsConfig,
        connections: StoreConnections,
        cache: Arc<dyn CacheBackend>,
    ) -> PermsResult<Self> {
        config.validate()?;
        let facade = CacheFacade::new(
            cache,
            config.cache_prefix.clone(),
            config.cache_version,
            config.default_lifetime_secs,
        );
        log::info!(
            "Permission store on table '{}' (cache version {})",
            config.table,
            config.cache_version
        );
        Ok(Self {
            config,
            read: connections.read,
            write: connections.write,
            cache: Arc::new(LayeredCache::new(facade)),
            registry: None,
        })
    }

    pub fn with_registry(mut self, registry: Arc<dyn ApplicationRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn config(&self) -> &PermsConfig {
        &self.config
    }

    /// Resolves the type a new permission called `name` should get.
    pub fn resolve_type(&self, name: &str) -> TypeResolution {
        resolve_type(self.registry.as_deref(), name)
    }

    /// Builds a new, unsaved permission. Never fails: registry problems fall
    /// back to the default type.
    pub fn create_new(&self, name: &str) -> PermissionRecord {
        let resolution = self.resolve_type(name);
        let data = PermissionData::new(resolution.kind(), resolution.params().cloned());
        PermissionRecord::new(name, self.config.cache_version, data)
    }

    /// Fetches a permission by name through the memo, the cache and finally
    /// the table.
    pub fn fetch_by_name(&self, name: &str) -> PermsResult<PermissionRecord> {
        if name == ROOT_NAME {
            return Ok(self.root_record());
        }

        let (mut record, layer) = self.cache.get_or_load(name, || {
            let row = self
                .reader()
                .row_by_name(&self.config.table, name)?
                .ok_or_else(|| PermsError::not_found(name))?;
            self.record_from_row(row)
        })?;
        if layer != Layer::Source {
            log::debug!("Permission '{}' served from {:?} cache", name, layer);
        }

        record.bind(self.write_handle());
        Ok(record)
    }

    /// Fetches a permission by id straight from the table.
    pub fn fetch_by_id(&self, id: PermId) -> PermsResult<PermissionRecord> {
        if id.is_root() {
            return Ok(self.root_record());
        }

        let row = self
            .reader()
            .row_by_id(&self.config.table, id)?
            .ok_or_else(|| PermsError::not_found(format!("permission id {}", id)))?;
        let mut record = self.record_from_row(row)?;
        record.bind(self.write_handle());
        Ok(record)
    }

    /// Inserts `record` as a new row, then saves its ACL payload.
    ///
    /// A leading `ROOT:` is dropped from the stored name. The parent chain is
    /// derived from the parent's row; see [`MissingParentPolicy`] for what
    /// happens when that row does not exist.
    pub fn add(&self, record: &mut PermissionRecord) -> PermsResult<PermId> {
        let requested = record.name().to_string();
        if requested.is_empty() {
            return Err(PermsError::invalid_argument(
                "permission name must be non-empty",
            ));
        }

        let name = strip_root_prefix(&requested).to_string();
        if name.is_empty() {
            return Err(PermsError::invalid_argument(format!(
                "permission name '{}' is empty below root",
                requested
            )));
        }
        if name == ROOT_NAME {
            return Err(PermsError::invalid_argument("the root permission is never stored"));
        }
        self.cache.invalidate(&requested);
        if name != requested {
            self.cache.invalidate(&name);
        }

        let parents = self.parent_chain_for(&name)?;
        let id = self.insert_row(&name, &parents)?;

        record.set_id(id);
        record.set_name(name);
        record.set_parents(&parents);
        record.bind(self.write_handle());
        record.save()?;

        log::info!("Added permission '{}' with id {}", record.name(), id);
        Ok(id)
    }

    /// Deletes the permission's row and, unless `force` is set, every
    /// descendant row. Returns the number of rows removed.
    ///
    /// `force` skips the descendant delete entirely; children are left in
    /// the table pointing at a parent that no longer exists.
    pub fn remove(&self, record: &PermissionRecord, force: bool) -> PermsResult<u64> {
        let name = record.name();
        self.cache.invalidate(name);

        let mut removed = self.write.delete_by_name(&self.config.table, name)?;
        if force {
            log::info!("Removed permission '{}' without its descendants", name);
            return Ok(removed);
        }

        self.invalidate_descendants(name)?;
        removed += self
            .write
            .delete_by_name_like(&self.config.table, &child_wildcard(name))?;
        log::info!("Removed permission '{}' ({} rows)", name, removed);
        Ok(removed)
    }

    /// Persists an ACL change made to a fetched or added record.
    pub fn save(&self, record: &PermissionRecord) -> PermsResult<()> {
        record.save()
    }

    /// Id stored for the record's name, without checking it exists.
    pub fn id_of(&self, record: &PermissionRecord) -> PermsResult<Option<PermId>> {
        if record.is_root() {
            return Ok(Some(PermId::ROOT));
        }
        Ok(self
            .reader()
            .row_by_name(&self.config.table, record.name())?
            .map(|row| row.perm_id))
    }

    pub fn exists(&self, name: &str) -> PermsResult<bool> {
        let remote = self.cache.remote();
        if let Some(count) = remote.get_exists(name) {
            return Ok(count != 0);
        }

        let count = self.reader().count_by_name(&self.config.table, name)?;
        remote.set_exists(name, count);
        Ok(count != 0)
    }

    /// Id of the immediate parent; ROOT for top-level or unknown names.
    pub fn parent_of(&self, child: &str) -> PermsResult<PermId> {
        match self.reader().row_by_name(&self.config.table, child)? {
            Some(row) => Ok(path_codec::last_ancestor_id(&row.perm_parents)?),
            None => Ok(PermId::ROOT),
        }
    }

    /// Full lineage of `child`, immediate parent first, ending at root.
    ///
    /// Top-level permissions have no stored lineage and are `NotFound`, like
    /// missing ones; use [`parent_of`](Self::parent_of) to get root for them.
    pub fn parents_of(&self, child: &str) -> PermsResult<AncestorTree> {
        let row = self
            .reader()
            .row_by_name(&self.config.table, child)?
            .filter(|row| !row.perm_parents.is_empty())
            .ok_or_else(|| PermsError::not_found(format!("parents of '{}'", child)))?;
        Ok(path_codec::ancestor_tree(&row.perm_parents)?)
    }

    /// Every stored `(id, name)` pair ordered by name, followed by root.
    pub fn tree(&self) -> PermsResult<Vec<(PermId, String)>> {
        let mut tree = self.reader().id_and_names_ordered(&self.config.table)?;
        tree.push((PermId::ROOT, ROOT_NAME.to_string()));
        Ok(tree)
    }

    /// Forgets the request-scoped memo; the external cache is untouched.
    pub fn clear_local_cache(&self) {
        self.cache.clear_local();
    }

    fn reader(&self) -> &dyn PermissionTable {
        if self.config.read_your_writes {
            self.write.as_ref()
        } else {
            self.read.as_ref()
        }
    }

    fn write_handle(&self) -> WriteHandle {
        let invalidator: Arc<dyn Invalidate> = self.cache.clone();
        WriteHandle::new(Arc::clone(&self.write), self.config.table.clone(), invalidator)
    }

    fn root_record(&self) -> PermissionRecord {
        let mut record = self.create_new(ROOT_NAME);
        record.set_id(PermId::ROOT);
        record.bind(self.write_handle());
        record
    }

    fn record_from_row(&self, row: PermissionRow) -> PermsResult<PermissionRecord> {
        let mut record = match row.perm_data.as_deref() {
            Some(payload) => PermissionRecord::new(
                row.perm_name.as_str(),
                self.config.cache_version,
                serde_json::from_str(payload)?,
            ),
            None => self.create_new(&row.perm_name),
        };
        record.set_id(row.perm_id);
        record.set_encoded_parents(row.perm_parents);
        Ok(record)
    }

    fn parent_chain_for(&self, name: &str) -> PermsResult<ParentChain> {
        let parent = match parent_name(name) {
            Some(parent) => parent,
            None => return Ok(ParentChain::default()),
        };

        match self.reader().row_by_name(&self.config.table, parent)? {
            Some(row) => Ok(ParentChain::parse(&row.perm_parents)?.child_of(row.perm_id)),
            None => match self.config.missing_parent {
                MissingParentPolicy::Reject => Err(PermsError::not_found(format!(
                    "parent '{}' of '{}'",
                    parent, name
                ))),
                MissingParentPolicy::AttachToRoot => {
                    log::warn!(
                        "Parent '{}' of '{}' does not exist; storing it under root",
                        parent,
                        name
                    );
                    Ok(ParentChain::default())
                }
            },
        }
    }

    /// Allocates an id and inserts the row, retrying when the id is taken.
    fn insert_row(&self, name: &str, parents: &ParentChain) -> PermsResult<PermId> {
        let table = &self.config.table;
        let mut attempt = 1;
        loop {
            let id = self.write.next_id(table)?;
            let row = PermissionRow::new(id, name, parents.encode());
            match self.write.insert(table, &row) {
                Ok(()) => return Ok(id),
                Err(StorageError::UniqueViolation { name }) => {
                    return Err(PermsError::AlreadyExists(name))
                }
                Err(StorageError::DuplicateId { id }) if attempt < self.config.max_add_attempts => {
                    log::warn!(
                        "Id {} already taken in '{}' (attempt {}), allocating another",
                        id,
                        table,
                        attempt
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn invalidate_descendants(&self, name: &str) -> PermsResult<()> {
        let prefix = child_prefix(name);
        for descendant in self.write.names_with_prefix(&self.config.table, &prefix)? {
            self.cache.invalidate(&descendant);
        }
        Ok(())
    }
}
