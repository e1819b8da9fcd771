use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::DEFAULT_PERMISSION_TYPE;

pub const PERMS_SHOW: u32 = 2;
pub const PERMS_READ: u32 = 4;
pub const PERMS_EDIT: u32 = 8;
pub const PERMS_DELETE: u32 = 16;
pub const PERMS_ALL: u32 = PERMS_SHOW | PERMS_READ | PERMS_EDIT | PERMS_DELETE;

/// ACL payload of one permission node, stored in `perm_data`.
///
/// Evaluating the masks is left to the caller; this type only carries them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionData {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    #[serde(default)]
    pub users: BTreeMap<String, u32>, // user -> mask
    #[serde(default)]
    pub groups: BTreeMap<String, u32>, // group -> mask
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<u32>,
}

impl PermissionData {
    pub fn new<S: Into<String>>(kind: S, params: Option<serde_json::Value>) -> Self {
        Self {
            kind: kind.into(),
            params,
            users: BTreeMap::new(),
            groups: BTreeMap::new(),
            default: None,
            guest: None,
            creator: None,
        }
    }

    /// Replaces the user's mask.
    pub fn set_user_permission<S: Into<String>>(&mut self, user: S, mask: u32) {
        self.users.insert(user.into(), mask);
    }

    /// ORs `mask` into whatever the user already holds.
    pub fn add_user_permission<S: Into<String>>(&mut self, user: S, mask: u32) {
        *self.users.entry(user.into()).or_insert(0) |= mask;
    }

    /// Clears `mask` bits; drops the entry once nothing is left.
    pub fn remove_user_permission(&mut self, user: &str, mask: u32) {
        if let Some(current) = self.users.get_mut(user) {
            *current &= !mask;
            if *current == 0 {
                self.users.remove(user);
            }
        }
    }

    pub fn user_permission(&self, user: &str) -> Option<u32> {
        self.users.get(user).copied()
    }

    pub fn set_group_permission<S: Into<String>>(&mut self, group: S, mask: u32) {
        self.groups.insert(group.into(), mask);
    }

    pub fn add_group_permission<S: Into<String>>(&mut self, group: S, mask: u32) {
        *self.groups.entry(group.into()).or_insert(0) |= mask;
    }

    pub fn remove_group_permission(&mut self, group: &str, mask: u32) {
        if let Some(current) = self.groups.get_mut(group) {
            *current &= !mask;
            if *current == 0 {
                self.groups.remove(group);
            }
        }
    }

    pub fn group_permission(&self, group: &str) -> Option<u32> {
        self.groups.get(group).copied()
    }
}

impl Default for PermissionData {
    fn default() -> Self {
        Self::new(DEFAULT_PERMISSION_TYPE, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_remove_user_bits() {
        let mut data = PermissionData::default();
        data.add_user_permission("alice", PERMS_READ);
        data.add_user_permission("alice", PERMS_EDIT);
        assert_eq!(data.user_permission("alice"), Some(PERMS_READ | PERMS_EDIT));

        data.remove_user_permission("alice", PERMS_READ);
        assert_eq!(data.user_permission("alice"), Some(PERMS_EDIT));

        data.remove_user_permission("alice", PERMS_EDIT);
        assert_eq!(data.user_permission("alice"), None);
    }

    #[test]
    fn test_json_shape_uses_type_key_and_skips_unset_masks() {
        let mut data = PermissionData::new("boolean", None);
        data.set_group_permission("admins", PERMS_ALL);
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["type"], "boolean");
        assert_eq!(json["groups"]["admins"], PERMS_ALL);
        assert!(json.get("guest").is_none());

        let parsed: PermissionData =
            serde_json::from_str(r#"{"type":"matrix","users":{"bob":4}}"#).unwrap();
        assert_eq!(parsed.user_permission("bob"), Some(PERMS_READ));
        assert!(parsed.groups.is_empty());
    }
}
