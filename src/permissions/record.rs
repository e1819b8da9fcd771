//! Permission records and the handle they save through.
//!
//! A record carries its ACL payload and, once added or fetched, a
//! [`WriteHandle`] bound by the store. Saving writes the payload by id and
//! invalidates every cache layer holding the record.

use crate::cache::Invalidate;
use crate::constants::{PATH_SEPARATOR, ROOT_NAME};
use crate::db_operations::PermissionTable;
use crate::error::{PermsError, PermsResult, StorageError};
use crate::permissions::path_codec::ParentChain;
use crate::permissions::types::{PermId, PermissionData};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Connection a record writes through when it is saved.
#[derive(Clone)]
pub struct WriteHandle {
    pub(crate) table: Arc<dyn PermissionTable>,
    pub(crate) table_name: String,
    pub(crate) invalidator: Arc<dyn Invalidate>,
}

impl WriteHandle {
    pub fn new<S: Into<String>>(
        table: Arc<dyn PermissionTable>,
        table_name: S,
        invalidator: Arc<dyn Invalidate>,
    ) -> Self {
        Self {
            table,
            table_name: table_name.into(),
            invalidator,
        }
    }
}

/// One permission node.
///
/// Records are built by [`PermissionStore::create_new`](super::PermissionStore::create_new)
/// or returned by the store's fetch operations. The write handle is not part
/// of the serialized form; the store re-binds every record it returns.
#[derive(Clone, Serialize, Deserialize)]
pub struct PermissionRecord {
    id: Option<PermId>,
    name: String,
    #[serde(default)]
    parents: String,
    cache_version: u32,
    data: PermissionData,
    #[serde(skip)]
    binding: Option<WriteHandle>,
}

impl PermissionRecord {
    pub fn new<S: Into<String>>(name: S, cache_version: u32, data: PermissionData) -> Self {
        Self {
            id: None,
            name: name.into(),
            parents: String::new(),
            cache_version,
            data,
            binding: None,
        }
    }

    /// `None` until the record has been added.
    pub fn id(&self) -> Option<PermId> {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last segment of the name.
    pub fn short_name(&self) -> &str {
        self.name
            .rsplit(PATH_SEPARATOR)
            .next()
            .unwrap_or(&self.name)
    }

    pub fn is_root(&self) -> bool {
        self.name == ROOT_NAME
    }

    pub fn cache_version(&self) -> u32 {
        self.cache_version
    }

    /// Encoded parent chain as stored in `perm_parents`.
    pub fn parents(&self) -> &str {
        &self.parents
    }

    pub fn parent_chain(&self) -> Result<ParentChain, StorageError> {
        ParentChain::parse(&self.parents)
    }

    pub fn data(&self) -> &PermissionData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut PermissionData {
        &mut self.data
    }

    pub fn set_data(&mut self, data: PermissionData) {
        self.data = data;
    }

    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    /// Persists the ACL payload through the bound write handle and
    /// invalidates every cache layer holding this permission.
    pub fn save(&self) -> PermsResult<()> {
        let id = self.id.ok_or_else(|| {
            PermsError::invalid_argument(format!(
                "permission '{}' has no id; add it before saving",
                self.name
            ))
        })?;
        let handle = self.binding.as_ref().ok_or_else(|| {
            PermsError::invalid_argument(format!(
                "permission '{}' is not bound to a store",
                self.name
            ))
        })?;

        let payload = serde_json::to_string(&self.data)?;
        let updated = handle
            .table
            .update_data(&handle.table_name, id, &payload)?;
        handle.invalidator.invalidate(&self.name);
        if !updated {
            return Err(PermsError::not_found(format!(
                "no row with id {} for '{}'",
                id, self.name
            )));
        }
        log::debug!("Saved permission '{}' ({})", self.name, id);
        Ok(())
    }

    pub(crate) fn set_id(&mut self, id: PermId) {
        self.id = Some(id);
    }

    pub(crate) fn set_name<S: Into<String>>(&mut self, name: S) {
        self.name = name.into();
    }

    pub(crate) fn set_parents(&mut self, parents: &ParentChain) {
        self.parents = parents.encode();
    }

    pub(crate) fn set_encoded_parents<S: Into<String>>(&mut self, parents: S) {
        self.parents = parents.into();
    }

    pub(crate) fn bind(&mut self, handle: WriteHandle) {
        self.binding = Some(handle);
    }
}

impl fmt::Debug for PermissionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionRecord")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("parents", &self.parents)
            .field("cache_version", &self.cache_version)
            .field("data", &self.data)
            .field("bound", &self.is_bound())
            .finish()
    }
}

impl PartialEq for PermissionRecord {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.parents == other.parents
            && self.cache_version == other.cache_version
            && self.data == other.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::types::PERMS_READ;

    #[test]
    fn test_short_name_and_root() {
        let record = PermissionRecord::new("app:feature:action", 2, PermissionData::default());
        assert_eq!(record.short_name(), "action");
        assert!(!record.is_root());
        assert!(PermissionRecord::new(ROOT_NAME, 2, PermissionData::default()).is_root());
    }

    #[test]
    fn test_save_requires_id_and_binding() {
        let mut record = PermissionRecord::new("app", 2, PermissionData::default());
        assert!(matches!(record.save(), Err(PermsError::InvalidArgument(_))));
        record.set_id(PermId::new(1));
        assert!(matches!(record.save(), Err(PermsError::InvalidArgument(_))));
    }

    #[test]
    fn test_serialized_form_skips_binding() {
        let mut record = PermissionRecord::new("app:x", 2, PermissionData::default());
        record.set_id(PermId::new(9));
        record.set_encoded_parents("3");
        record.data_mut().set_user_permission("user1", PERMS_READ);

        let blob = serde_json::to_vec(&record).unwrap();
        let decoded: PermissionRecord = serde_json::from_slice(&blob).unwrap();
        assert_eq!(decoded, record);
        assert!(!decoded.is_bound());
        assert_eq!(decoded.parent_chain().unwrap().immediate_parent(), PermId::new(3));
    }
}
