//! Colon-delimited encoding of permission names and parent chains.
//!
//! A permission name such as `app:feature:action` is a path; its parent is
//! `app:feature`. A parent chain lists ancestor ids from the most distant to
//! the immediate parent, e.g. `"3:17:42"`. An empty chain means the parent is
//! root.

use crate::constants::{PATH_SEPARATOR, ROOT_NAME};
use crate::error::StorageError;
use crate::permissions::types::PermId;
use std::fmt;

/// Name of the immediate parent, or `None` for a top-level name.
pub fn parent_name(name: &str) -> Option<&str> {
    name.rfind(PATH_SEPARATOR).map(|pos| &name[..pos])
}

/// Removes a leading `ROOT:` segment; root is implicit in stored names.
pub fn strip_root_prefix(name: &str) -> &str {
    name.strip_prefix(ROOT_NAME)
        .and_then(|rest| rest.strip_prefix(PATH_SEPARATOR))
        .unwrap_or(name)
}

/// SQL `LIKE` pattern matching every descendant of `name`.
pub fn child_wildcard(name: &str) -> String {
    format!("{}{}%", name, PATH_SEPARATOR)
}

/// Literal prefix shared by every descendant of `name`.
pub fn child_prefix(name: &str) -> String {
    format!("{}{}", name, PATH_SEPARATOR)
}

/// Immediate parent id encoded in `chain`, ROOT when the chain is empty.
///
/// Only the last segment is decoded.
pub fn last_ancestor_id(chain: &str) -> Result<PermId, StorageError> {
    match chain.rsplit(PATH_SEPARATOR).next() {
        None | Some("") => Ok(PermId::ROOT),
        Some(last) => last
            .parse()
            .map_err(|e| StorageError::corrupt(format!("bad parent chain '{}': {}", chain, e))),
    }
}

/// Unfolds `chain` into a nested [`AncestorTree`], immediate parent outermost.
pub fn ancestor_tree(chain: &str) -> Result<AncestorTree, StorageError> {
    let chain = ParentChain::parse(chain)?;
    Ok(chain
        .ids()
        .iter()
        .fold(AncestorTree::Root, |parent, &id| AncestorTree::Ancestor {
            id,
            parent: Box::new(parent),
        }))
}

/// Decoded `perm_parents` value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParentChain(Vec<PermId>);

impl ParentChain {
    pub fn parse(encoded: &str) -> Result<Self, StorageError> {
        if encoded.is_empty() {
            return Ok(Self::default());
        }
        encoded
            .split(PATH_SEPARATOR)
            .map(|segment| {
                segment.parse::<PermId>().map_err(|e| {
                    StorageError::corrupt(format!(
                        "bad segment '{}' in parent chain '{}': {}",
                        segment, encoded, e
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(ParentChain)
    }

    /// Chain for a child of the node owning `self`, whose id is `parent`.
    pub fn child_of(&self, parent: PermId) -> Self {
        let mut ids = self.0.clone();
        ids.push(parent);
        ParentChain(ids)
    }

    pub fn ids(&self) -> &[PermId] {
        &self.0
    }

    pub fn immediate_parent(&self) -> PermId {
        self.0.last().copied().unwrap_or(PermId::ROOT)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ParentChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, id) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", PATH_SEPARATOR)?;
            }
            write!(f, "{}", id)?;
        }
        Ok(())
    }
}

/// Lineage of a permission, starting at its immediate parent and ending at root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AncestorTree {
    Root,
    Ancestor {
        id: PermId,
        parent: Box<AncestorTree>,
    },
}

impl AncestorTree {
    /// Ancestor ids, immediate parent first. Root is not yielded.
    pub fn iter(&self) -> Ancestors<'_> {
        Ancestors { node: self }
    }

    /// Number of levels above the permission before root is reached.
    pub fn depth(&self) -> usize {
        self.iter().count()
    }

    pub fn immediate_parent(&self) -> PermId {
        self.iter().next().unwrap_or(PermId::ROOT)
    }

    /// Nested map form keyed by chain prefix, e.g.
    /// `{"3:17": {"3": {"ROOT": true}}}`.
    pub fn to_json(&self) -> serde_json::Value {
        let mut ids: Vec<PermId> = self.iter().collect();
        ids.reverse();

        let mut terminal = serde_json::Map::new();
        terminal.insert(ROOT_NAME.to_string(), serde_json::Value::Bool(true));
        let mut value = serde_json::Value::Object(terminal);
        for depth in 1..=ids.len() {
            let key = ParentChain(ids[..depth].to_vec()).encode();
            let mut level = serde_json::Map::new();
            level.insert(key, value);
            value = serde_json::Value::Object(level);
        }
        value
    }
}

// The derived drop would recurse once per level.
impl Drop for AncestorTree {
    fn drop(&mut self) {
        let mut next = match self {
            AncestorTree::Root => return,
            AncestorTree::Ancestor { parent, .. } => {
                std::mem::replace(parent.as_mut(), AncestorTree::Root)
            }
        };
        while let AncestorTree::Ancestor { parent, .. } = &mut next {
            let detached = std::mem::replace(parent.as_mut(), AncestorTree::Root);
            next = detached;
        }
    }
}

pub struct Ancestors<'a> {
    node: &'a AncestorTree,
}

impl Iterator for Ancestors<'_> {
    type Item = PermId;

    fn next(&mut self) -> Option<PermId> {
        match self.node {
            AncestorTree::Root => None,
            AncestorTree::Ancestor { id, parent } => {
                self.node = parent;
                Some(*id)
            }
        }
    }
}
