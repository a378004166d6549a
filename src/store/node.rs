use std::sync::{Arc, Weak};

use serde_json::Value;

use super::{Shared, StoreState, reserved};
use crate::{
    ConfigError, Result, Snapshot,
    tree::{Entry, NodeId},
};

/// A value read from the tree: a leaf, or a handle to a nested mapping.
#[derive(Debug, Clone)]
pub enum Item {
    /// Scalar or array.
    Value(Value),
    /// Live mapping.
    Node(ConfigNode),
}

impl Item {
    /// The leaf value, if this is one.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Item::Value(value) => Some(value),
            Item::Node(_) => None,
        }
    }

    /// The mapping handle, if this is one.
    pub fn into_node(self) -> Option<ConfigNode> {
        match self {
            Item::Node(node) => Some(node),
            Item::Value(_) => None,
        }
    }

    /// Whether this is a mapping.
    pub fn is_node(&self) -> bool {
        matches!(self, Item::Node(_))
    }
}

/// Handle to one mapping level of a store's tree.
///
/// Handles do not keep the store alive; once every [`ConfigStore`] clone is
/// dropped, operations fail with `ConfigError::StoreDropped`. A handle whose
/// mapping was deleted or replaced fails with `ConfigError::NotFound`.
///
/// [`ConfigStore`]: super::ConfigStore
#[derive(Debug, Clone)]
pub struct ConfigNode {
    store: Weak<Shared>,
    id: NodeId,
}

impl ConfigNode {
    pub(super) fn new(store: Weak<Shared>, id: NodeId) -> Self {
        Self { store, id }
    }

    /// Entry under `key`. Never creates anything.
    pub fn get(&self, key: &str) -> Result<Option<Item>> {
        self.read(|shared, state| {
            Ok(state
                .tree
                .get(self.id, key)?
                .map(|entry| self.item(shared, entry)))
        })
    }

    /// Mapping under `key`, created empty when absent.
    ///
    /// # Errors
    /// * `ConfigError::PathConflict` - If `key` holds a value
    /// * `ConfigError::ReservedKeyword` - If this is the root and `key` is reserved
    pub fn get_or_create(&self, key: &str) -> Result<ConfigNode> {
        self.check_reserved(key)?;
        let shared = self.shared()?;
        let id = shared.mutate(|tree| tree.get_or_create(self.id, key))?;
        Ok(ConfigNode::new(self.store.clone(), id))
    }

    /// Stores `value` under `key`. Objects become nested mappings.
    ///
    /// # Errors
    /// * `ConfigError::PathConflict` - On a value/mapping mismatch without `overwrite`
    /// * `ConfigError::ReservedKeyword` - If this is the root and `key` is reserved
    /// * `ConfigError::InvalidPath` - If `key` is empty or contains '.'
    pub fn set(&self, key: &str, value: impl Into<Value>, overwrite: bool) -> Result<()> {
        self.check_reserved(key)?;
        let value = value.into();
        self.shared()?
            .mutate(|tree| tree.set(self.id, key, value, overwrite).map(|_| ()))
    }

    /// Removes `key`.
    ///
    /// # Errors
    /// * `ConfigError::NotFound` - If `key` is absent
    pub fn delete(&self, key: &str) -> Result<()> {
        self.shared()?.mutate(|tree| tree.delete(self.id, key))
    }

    /// Follows a dotted path below this mapping.
    ///
    /// # Errors
    /// * `ConfigError::NotFound` - If a segment is missing or not a mapping
    pub fn resolve_path(&self, path: &str) -> Result<Item> {
        self.read(|shared, state| {
            state
                .tree
                .lookup_from(self.id, path)?
                .map(|entry| self.item(shared, entry))
                .ok_or_else(|| ConfigError::NotFound(path.to_string()))
        })
    }

    /// Plain snapshot of this mapping.
    pub fn flatten(&self) -> Result<Snapshot> {
        self.read(|_, state| state.tree.flatten(self.id))
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> Result<Vec<String>> {
        self.read(|_, state| state.tree.keys(self.id))
    }

    /// Number of direct entries.
    pub fn len(&self) -> Result<usize> {
        self.read(|_, state| state.tree.len(self.id))
    }

    /// Whether the mapping has no entries.
    pub fn is_empty(&self) -> Result<bool> {
        self.len().map(|len| len == 0)
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &str) -> Result<bool> {
        self.read(|_, state| Ok(state.tree.get(self.id, key)?.is_some()))
    }

    /// Dotted path from the root; empty for the root itself.
    pub fn path(&self) -> Result<String> {
        self.read(|_, state| state.tree.path_of(self.id))
    }

    /// Enclosing mapping, or `None` for the root.
    pub fn parent(&self) -> Result<Option<ConfigNode>> {
        self.read(|_, state| {
            Ok(state
                .tree
                .parent(self.id)?
                .map(|id| ConfigNode::new(self.store.clone(), id)))
        })
    }

    /// Whether this handle is the root mapping.
    pub fn is_root(&self) -> bool {
        self.id == NodeId::ROOT
    }

    fn shared(&self) -> Result<Arc<Shared>> {
        self.store.upgrade().ok_or(ConfigError::StoreDropped)
    }

    fn read<R>(&self, f: impl FnOnce(&Arc<Shared>, &StoreState) -> Result<R>) -> Result<R> {
        let shared = self.shared()?;
        let state = shared.lock()?;
        f(&shared, &state)
    }

    fn item(&self, shared: &Arc<Shared>, entry: Entry) -> Item {
        match entry {
            Entry::Leaf(value) => Item::Value(value),
            Entry::Node(id) => Item::Node(ConfigNode::new(Arc::downgrade(shared), id)),
        }
    }

    fn check_reserved(&self, key: &str) -> Result<()> {
        if self.is_root() {
            reserved::check(key)?;
        }
        Ok(())
    }
}

impl PartialEq for ConfigNode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Weak::ptr_eq(&self.store, &other.store)
    }
}
