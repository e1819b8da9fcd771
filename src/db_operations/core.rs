use super::table::{PermissionRow, PermissionTable};
use crate::error::StorageError;
use crate::permissions::types::PermId;
use sled::transaction::{abort, TransactionError};
use sled::Transactional;

const SEQUENCE_KEY: &[u8] = b"seq";

/// Trees backing one logical table.
struct TableTrees {
    /// perm_id (big-endian) -> JSON row
    rows: sled::Tree,
    /// perm_name -> perm_id (big-endian); sled keeps it sorted by name
    names: sled::Tree,
    seq: sled::Tree,
}

/// sled-backed implementation of [`PermissionTable`].
///
/// `LIKE` patterns are supported when the only wildcard is a trailing `%`;
/// every other character, including `_`, is matched literally.
#[derive(Clone)]
pub struct SledPermissionTable {
    /// The underlying sled database instance
    db: sled::Db,
}

impl SledPermissionTable {
    pub fn new(db: sled::Db) -> Self {
        Self { db }
    }

    /// Opens a database at `path`.
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Self, StorageError> {
        Ok(Self::new(sled::open(path)?))
    }

    /// In-memory database removed on drop.
    pub fn temporary() -> Result<Self, StorageError> {
        Ok(Self::new(sled::Config::new().temporary(true).open()?))
    }

    /// Gets a reference to the underlying database
    pub fn db(&self) -> &sled::Db {
        &self.db
    }

    fn trees(&self, table: &str) -> Result<TableTrees, StorageError> {
        Ok(TableTrees {
            rows: self.db.open_tree(table)?,
            names: self.db.open_tree(format!("{}_names", table))?,
            seq: self.db.open_tree(format!("{}_seq", table))?,
        })
    }

    fn decode_row(bytes: &[u8]) -> Result<PermissionRow, StorageError> {
        serde_json::from_slice(bytes)
            .map_err(|e| StorageError::corrupt(format!("Deserialization failed: {}", e)))
    }

    fn decode_id(bytes: &[u8]) -> Result<PermId, StorageError> {
        <[u8; 8]>::try_from(bytes)
            .map(PermId::from_be_bytes)
            .map_err(|_| StorageError::corrupt(format!("id of {} bytes", bytes.len())))
    }

    fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }

    fn map_transaction_error(error: TransactionError<StorageError>) -> StorageError {
        match error {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => e.into(),
        }
    }
}

impl PermissionTable for SledPermissionTable {
    fn row_by_name(&self, table: &str, name: &str) -> Result<Option<PermissionRow>, StorageError> {
        let trees = self.trees(table)?;
        match trees.names.get(name.as_bytes())? {
            Some(id) => match trees.rows.get(&id)? {
                Some(bytes) => Self::decode_row(&bytes).map(Some),
                None => Err(StorageError::corrupt(format!(
                    "name index points at missing row for '{}'",
                    name
                ))),
            },
            None => Ok(None),
        }
    }

    fn row_by_id(&self, table: &str, id: PermId) -> Result<Option<PermissionRow>, StorageError> {
        let trees = self.trees(table)?;
        match trees.rows.get(id.to_be_bytes())? {
            Some(bytes) => Self::decode_row(&bytes).map(Some),
            None => Ok(None),
        }
    }

    fn count_by_name(&self, table: &str, name: &str) -> Result<u64, StorageError> {
        let trees = self.trees(table)?;
        Ok(u64::from(trees.names.contains_key(name.as_bytes())?))
    }

    fn id_and_names_ordered(&self, table: &str) -> Result<Vec<(PermId, String)>, StorageError> {
        let trees = self.trees(table)?;
        let mut items = Vec::new();
        for result in trees.names.iter() {
            let (name, id) = result?;
            items.push((
                Self::decode_id(&id)?,
                String::from_utf8_lossy(&name).to_string(),
            ));
        }
        Ok(items)
    }

    fn names_with_prefix(&self, table: &str, prefix: &str) -> Result<Vec<String>, StorageError> {
        let trees = self.trees(table)?;
        let mut names = Vec::new();
        for result in trees.names.scan_prefix(prefix.as_bytes()) {
            let (name, _) = result?;
            names.push(String::from_utf8_lossy(&name).to_string());
        }
        Ok(names)
    }

    fn next_id(&self, table: &str) -> Result<PermId, StorageError> {
        let trees = self.trees(table)?;
        let updated = trees.seq.update_and_fetch(SEQUENCE_KEY, |current| {
            let last = current
                .and_then(|bytes| <[u8; 8]>::try_from(bytes).ok())
                .map(i64::from_be_bytes)
                .unwrap_or(0);
            Some((last + 1).to_be_bytes().to_vec())
        })?;
        match updated {
            Some(bytes) => Self::decode_id(&bytes),
            None => Err(StorageError::backend(format!(
                "sequence for table '{}' vanished",
                table
            ))),
        }
    }

    fn insert(&self, table: &str, row: &PermissionRow) -> Result<(), StorageError> {
        let trees = self.trees(table)?;
        let encoded = serde_json::to_vec(row)
            .map_err(|e| StorageError::corrupt(format!("Serialization failed: {}", e)))?;
        let id_key = row.perm_id.to_be_bytes();

        (&trees.rows, &trees.names)
            .transaction(|(rows, names)| {
                if names.get(row.perm_name.as_bytes())?.is_some() {
                    return abort(StorageError::UniqueViolation {
                        name: row.perm_name.clone(),
                    });
                }
                if rows.get(&id_key[..])?.is_some() {
                    return abort(StorageError::DuplicateId {
                        id: row.perm_id.value(),
                    });
                }
                rows.insert(&id_key[..], encoded.clone())?;
                names.insert(row.perm_name.as_bytes(), &id_key[..])?;
                Ok(())
            })
            .map_err(Self::map_transaction_error)?;

        self.flush()
    }

    fn update_data(&self, table: &str, id: PermId, data: &str) -> Result<bool, StorageError> {
        let trees = self.trees(table)?;
        let id_key = id.to_be_bytes();

        let updated = trees
            .rows
            .transaction(|rows| {
                let bytes = match rows.get(&id_key[..])? {
                    Some(bytes) => bytes,
                    None => return Ok(false),
                };
                let mut row = match Self::decode_row(&bytes) {
                    Ok(row) => row,
                    Err(e) => return abort(e),
                };
                row.perm_data = Some(data.to_string());
                let encoded = match serde_json::to_vec(&row) {
                    Ok(encoded) => encoded,
                    Err(e) => {
                        return abort(StorageError::corrupt(format!(
                            "Serialization failed: {}",
                            e
                        )))
                    }
                };
                rows.insert(&id_key[..], encoded)?;
                Ok(true)
            })
            .map_err(Self::map_transaction_error)?;

        self.flush()?;
        Ok(updated)
    }

    fn delete_by_name(&self, table: &str, name: &str) -> Result<u64, StorageError> {
        let trees = self.trees(table)?;

        let removed = (&trees.rows, &trees.names)
            .transaction(|(rows, names)| match names.remove(name.as_bytes())? {
                Some(id) => {
                    rows.remove(id)?;
                    Ok(1u64)
                }
                None => Ok(0u64),
            })
            .map_err(Self::map_transaction_error)?;

        self.flush()?;
        Ok(removed)
    }

    fn delete_by_name_like(&self, table: &str, pattern: &str) -> Result<u64, StorageError> {
        let prefix = match pattern.strip_suffix('%') {
            Some(prefix) => prefix,
            None => return self.delete_by_name(table, pattern),
        };
        let trees = self.trees(table)?;

        let mut matched = Vec::new();
        for result in trees.names.scan_prefix(prefix.as_bytes()) {
            let (name, id) = result?;
            matched.push((name, id));
        }
        if matched.is_empty() {
            return Ok(0);
        }

        (&trees.rows, &trees.names)
            .transaction(|(rows, names)| {
                for (name, id) in &matched {
                    names.remove(name.clone())?;
                    rows.remove(id.clone())?;
                }
                Ok(())
            })
            .map_err(Self::map_transaction_error)?;

        self.flush()?;
        Ok(matched.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "perms";

    fn table() -> SledPermissionTable {
        SledPermissionTable::temporary().unwrap()
    }

    #[test]
    fn test_sequence_is_scoped_per_table() {
        let db = table();
        assert_eq!(db.next_id("a").unwrap(), PermId::new(1));
        assert_eq!(db.next_id("a").unwrap(), PermId::new(2));
        assert_eq!(db.next_id("b").unwrap(), PermId::new(1));
    }

    #[test]
    fn test_insert_and_lookup() {
        let db = table();
        db.insert(TABLE, &PermissionRow::new(PermId::new(1), "app", ""))
            .unwrap();

        let by_name = db.row_by_name(TABLE, "app").unwrap().unwrap();
        assert_eq!(by_name.perm_id, PermId::new(1));
        assert_eq!(by_name.perm_data, None);
        assert_eq!(db.row_by_id(TABLE, PermId::new(1)).unwrap(), Some(by_name));
        assert_eq!(db.count_by_name(TABLE, "app").unwrap(), 1);
        assert_eq!(db.count_by_name(TABLE, "other").unwrap(), 0);
        assert!(db.row_by_name(TABLE, "other").unwrap().is_none());
    }

    #[test]
    fn test_insert_rejects_duplicates() {
        let db = table();
        db.insert(TABLE, &PermissionRow::new(PermId::new(1), "app", ""))
            .unwrap();

        let dup_name = db.insert(TABLE, &PermissionRow::new(PermId::new(2), "app", ""));
        assert!(matches!(dup_name, Err(StorageError::UniqueViolation { .. })));

        let dup_id = db.insert(TABLE, &PermissionRow::new(PermId::new(1), "other", ""));
        assert!(matches!(dup_id, Err(StorageError::DuplicateId { id: 1 })));
        assert_eq!(db.count_by_name(TABLE, "other").unwrap(), 0);
    }

    #[test]
    fn test_update_data() {
        let db = table();
        db.insert(TABLE, &PermissionRow::new(PermId::new(4), "app", ""))
            .unwrap();
        assert!(db.update_data(TABLE, PermId::new(4), "{\"type\":\"matrix\"}").unwrap());
        assert!(!db.update_data(TABLE, PermId::new(5), "{}").unwrap());

        let row = db.row_by_id(TABLE, PermId::new(4)).unwrap().unwrap();
        assert_eq!(row.perm_data.as_deref(), Some("{\"type\":\"matrix\"}"));
    }

    #[test]
    fn test_ordered_listing_and_like_delete() {
        let db = table();
        for (id, name) in [(1, "b"), (2, "a"), (3, "a:y"), (4, "a:x"), (5, "ab")] {
            db.insert(TABLE, &PermissionRow::new(PermId::new(id), name, ""))
                .unwrap();
        }

        let names: Vec<String> = db
            .id_and_names_ordered(TABLE)
            .unwrap()
            .into_iter()
            .map(|(_, name)| name)
            .collect();
        assert_eq!(names, vec!["a", "a:x", "a:y", "ab", "b"]);
        assert_eq!(db.names_with_prefix(TABLE, "a:").unwrap(), vec!["a:x", "a:y"]);
        assert!(db.names_with_prefix(TABLE, "c").unwrap().is_empty());

        assert_eq!(db.delete_by_name_like(TABLE, "a:%").unwrap(), 2);
        assert_eq!(db.count_by_name(TABLE, "a").unwrap(), 1);
        assert_eq!(db.count_by_name(TABLE, "ab").unwrap(), 1);
        assert!(db.row_by_id(TABLE, PermId::new(3)).unwrap().is_none());

        assert_eq!(db.delete_by_name(TABLE, "a").unwrap(), 1);
        assert_eq!(db.delete_by_name(TABLE, "a").unwrap(), 0);
    }
}
