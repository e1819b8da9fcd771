use crate::error::StorageError;
use crate::permissions::types::PermId;
use serde::{Deserialize, Serialize};

/// One row of the permissions table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRow {
    pub perm_id: PermId,
    pub perm_name: String,
    /// Colon-delimited ancestor ids, empty for top-level permissions.
    pub perm_parents: String,
    /// Serialized ACL payload; `None` until the permission is first saved.
    #[serde(default)]
    pub perm_data: Option<String>,
}

impl PermissionRow {
    pub fn new<S: Into<String>, P: Into<String>>(id: PermId, name: S, parents: P) -> Self {
        Self {
            perm_id: id,
            perm_name: name.into(),
            perm_parents: parents.into(),
            perm_data: None,
        }
    }
}

/// Storage port for the permissions table.
///
/// Every method names the table it operates on, so one connection can serve
/// several stores. Implementations must keep `perm_name` unique and report
/// collisions as [`StorageError::UniqueViolation`].
pub trait PermissionTable: Send + Sync {
    fn row_by_name(&self, table: &str, name: &str) -> Result<Option<PermissionRow>, StorageError>;

    fn row_by_id(&self, table: &str, id: PermId) -> Result<Option<PermissionRow>, StorageError>;

    /// `SELECT COUNT(*) ... WHERE perm_name = ?`
    fn count_by_name(&self, table: &str, name: &str) -> Result<u64, StorageError>;

    /// Every `(perm_id, perm_name)` pair ordered by name ascending.
    fn id_and_names_ordered(&self, table: &str) -> Result<Vec<(PermId, String)>, StorageError>;

    /// Names starting with `prefix`, ordered ascending.
    fn names_with_prefix(&self, table: &str, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Allocates the next id from the sequence scoped to `table`.
    fn next_id(&self, table: &str) -> Result<PermId, StorageError>;

    fn insert(&self, table: &str, row: &PermissionRow) -> Result<(), StorageError>;

    /// Replaces `perm_data`; returns false when no row has `id`.
    fn update_data(&self, table: &str, id: PermId, data: &str) -> Result<bool, StorageError>;

    /// Deletes the row named exactly `name`; returns the number of rows removed.
    fn delete_by_name(&self, table: &str, name: &str) -> Result<u64, StorageError>;

    /// Deletes every row whose name matches the `LIKE` pattern in a single
    /// operation; returns the number of rows removed.
    fn delete_by_name_like(&self, table: &str, pattern: &str) -> Result<u64, StorageError>;
}
