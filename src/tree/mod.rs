//! Arena-backed configuration tree.
//!
//! Every mapping level is a node in a slot arena addressed by [`NodeId`].
//! Children point at their parent by id, so the structure has no ownership
//! cycles. Freed slots bump their generation; a stale id resolves to
//! `ConfigError::NotFound` instead of aliasing whatever reuses the slot.

pub mod path;

use std::fmt;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::debug;

use crate::{ConfigError, Result, Snapshot};

/// Generation-checked handle to a node in a [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    /// Id of every tree's root node.
    pub const ROOT: NodeId = NodeId {
        index: 0,
        generation: 0,
    };
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// A stored value: a scalar leaf or a nested node.
///
/// Arrays are carried as opaque leaves.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    /// Scalar or array value.
    Leaf(Value),
    /// Nested mapping.
    Node(NodeId),
}

impl Entry {
    fn is_node(&self) -> bool {
        matches!(self, Entry::Node(_))
    }
}

struct NodeData {
    entries: IndexMap<String, Entry>,
    parent: Option<NodeId>,
    key_in_parent: Option<String>,
    revision: u64,
}

impl NodeData {
    fn new(parent: Option<NodeId>, key_in_parent: Option<String>) -> Self {
        Self {
            entries: IndexMap::new(),
            parent,
            key_in_parent,
            revision: 0,
        }
    }
}

struct Slot {
    generation: u32,
    node: Option<NodeData>,
}

/// Mutable tree of mapping nodes with dirty tracking.
pub struct Tree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
    dirty: bool,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("nodes", &self.node_count())
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl Tree {
    /// Creates a tree holding only an empty root.
    pub fn new() -> Self {
        Self {
            slots: vec![Slot {
                generation: 0,
                node: Some(NodeData::new(None, None)),
            }],
            free: Vec::new(),
            root: NodeId::ROOT,
            dirty: false,
        }
    }

    /// Creates a tree from a snapshot. The result is not dirty.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut tree = Self::new();
        tree.fill(tree.root, snapshot);
        tree
    }

    /// Root node id. Stable for the lifetime of the tree.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Whether `id` still names a live node.
    pub fn is_live(&self, id: NodeId) -> bool {
        self.node(id).is_ok()
    }

    /// Number of live nodes, root included.
    pub fn node_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.node.is_some()).count()
    }

    /// Whether the tree changed since the flag was last cleared.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Forces the dirty flag on.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Clears the dirty flag.
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Mutation counter of a node, bumped whenever it or a descendant changes.
    pub fn revision(&self, id: NodeId) -> Result<u64> {
        Ok(self.node(id)?.revision)
    }

    /// Replaces the whole tree with `snapshot`, keeping the root id.
    ///
    /// The dirty flag is left untouched.
    pub fn reset(&mut self, snapshot: Snapshot) {
        let root = self.root;
        let children: Vec<NodeId> = self.child_nodes(root);
        for child in children {
            self.free_subtree(child);
        }
        if let Ok(node) = self.node_mut(root) {
            node.entries.clear();
            node.revision += 1;
        }
        self.fill(root, snapshot);
    }

    /// Entry stored under `key`. Never creates anything.
    ///
    /// # Errors
    /// * `ConfigError::NotFound` - If `id` is stale
    pub fn get(&self, id: NodeId, key: &str) -> Result<Option<Entry>> {
        Ok(self.node(id)?.entries.get(key).cloned())
    }

    /// Child node under `key`, created empty when absent.
    ///
    /// # Errors
    /// * `ConfigError::InvalidPath` - If the key is malformed
    /// * `ConfigError::PathConflict` - If `key` holds a leaf
    /// * `ConfigError::NotFound` - If `id` is stale
    pub fn get_or_create(&mut self, id: NodeId, key: &str) -> Result<NodeId> {
        path::validate_key(key)?;

        match self.node(id)?.entries.get(key) {
            Some(Entry::Node(child)) => Ok(*child),
            Some(Entry::Leaf(_)) => Err(ConfigError::conflict(
                self.child_path(id, key)?,
                "holds a value, not a mapping",
            )),
            None => {
                let child = self.insert_node(id, key);
                self.propagate_dirty(id);
                Ok(child)
            }
        }
    }

    /// Stores `value` under `key`. Objects become nested nodes.
    ///
    /// Returns whether anything changed; writing an equal value is a no-op.
    ///
    /// # Errors
    /// * `ConfigError::InvalidPath` - If the key is malformed
    /// * `ConfigError::PathConflict` - If the existing entry is of the other
    ///   class (leaf vs mapping) and `overwrite` is false
    /// * `ConfigError::NotFound` - If `id` is stale
    pub fn set(&mut self, id: NodeId, key: &str, value: Value, overwrite: bool) -> Result<bool> {
        path::validate_key(key)?;
        validate_value(&value)?;

        let mismatch = match self.node(id)?.entries.get(key) {
            Some(existing) if existing.is_node() != value.is_object() && !overwrite => {
                Some(class_mismatch(existing))
            }
            _ => None,
        };
        if let Some(reason) = mismatch {
            return Err(ConfigError::conflict(self.child_path(id, key)?, reason));
        }

        self.store(id, key, value)
    }

    /// Removes `key` and everything below it.
    ///
    /// # Errors
    /// * `ConfigError::NotFound` - If `key` is absent or `id` is stale
    pub fn delete(&mut self, id: NodeId, key: &str) -> Result<()> {
        if !self.node(id)?.entries.contains_key(key) {
            return Err(ConfigError::NotFound(self.child_path(id, key)?));
        }
        self.remove_entry(id, key);
        self.propagate_dirty(id);
        Ok(())
    }

    /// Follows a dot-separated path from the root.
    ///
    /// Returns `None` when a segment is missing or an intermediate segment is
    /// a leaf.
    ///
    /// # Errors
    /// * `ConfigError::InvalidPath` - If the path is malformed
    pub fn lookup(&self, path: &str) -> Result<Option<Entry>> {
        self.lookup_from(self.root, path)
    }

    /// Follows a dot-separated path relative to the node `id`.
    ///
    /// # Errors
    /// * `ConfigError::InvalidPath` - If the path is malformed
    /// * `ConfigError::NotFound` - If `id` is stale
    pub fn lookup_from(&self, id: NodeId, path: &str) -> Result<Option<Entry>> {
        let parts = path::split(path)?;
        let mut current = id;

        for (i, part) in parts.iter().enumerate() {
            let entry = match self.node(current)?.entries.get(*part) {
                Some(entry) => entry,
                None => return Ok(None),
            };

            if i == parts.len() - 1 {
                return Ok(Some(entry.clone()));
            }

            match entry {
                Entry::Node(child) => current = *child,
                Entry::Leaf(_) => return Ok(None),
            }
        }

        Ok(None)
    }

    /// Like [`lookup`](Self::lookup) but absent paths are an error.
    ///
    /// # Errors
    /// * `ConfigError::InvalidPath` - If the path is malformed
    /// * `ConfigError::NotFound` - If any segment is missing or not a mapping
    pub fn resolve(&self, path: &str) -> Result<Entry> {
        self.lookup(path)?
            .ok_or_else(|| ConfigError::NotFound(path.to_string()))
    }

    /// Writes `value` at a dot-separated path, creating intermediate mappings.
    ///
    /// Conflicts are detected before anything is created, so a failed write
    /// leaves the tree unchanged.
    ///
    /// # Errors
    /// * `ConfigError::InvalidPath` - If the path is malformed
    /// * `ConfigError::PathConflict` - If an intermediate segment is a leaf,
    ///   or the final entry has the other class, and `overwrite` is false
    pub fn write_path(&mut self, path: &str, value: Value, overwrite: bool) -> Result<bool> {
        let parts = path::split(path)?;
        validate_value(&value)?;
        if !overwrite {
            self.check_write(&parts, &value)?;
        }

        let (last, intermediate) = parts
            .split_last()
            .ok_or_else(|| ConfigError::InvalidPath(path.to_string()))?;

        let mut current = self.root;
        let mut created = false;
        for part in intermediate {
            let (child, fresh) = self.ensure_node(current, part);
            created |= fresh;
            current = child;
        }

        let changed = self.store(current, last, value)?;
        if created && !changed {
            self.propagate_dirty(current);
        }
        Ok(changed || created)
    }

    /// Deletes the entry at `path`, then prunes ancestors left empty.
    ///
    /// Pruning stops at the first ancestor that still has entries. The root
    /// is never removed.
    ///
    /// # Errors
    /// * `ConfigError::InvalidPath` - If the path is malformed
    /// * `ConfigError::NotFound` - If the path does not exist
    pub fn delete_path(&mut self, path: &str) -> Result<()> {
        let parts = path::split(path)?;
        let mut chain = Vec::with_capacity(parts.len());
        let mut current = self.root;

        for (i, part) in parts.iter().enumerate() {
            chain.push(current);
            let entry = self
                .node(current)?
                .entries
                .get(*part)
                .ok_or_else(|| ConfigError::NotFound(path.to_string()))?;

            if i < parts.len() - 1 {
                match entry {
                    Entry::Node(child) => current = *child,
                    Entry::Leaf(_) => return Err(ConfigError::NotFound(path.to_string())),
                }
            }
        }

        let mut deepest = current;
        self.remove_entry(current, parts[parts.len() - 1]);

        for depth in (0..parts.len() - 1).rev() {
            let child = chain[depth + 1];
            if !self.node(child)?.entries.is_empty() {
                break;
            }
            let parent = chain[depth];
            self.remove_entry(parent, parts[depth]);
            deepest = parent;
            debug!(path = %path::prefix(&parts, depth + 1), "Pruned empty mapping");
        }

        self.propagate_dirty(deepest);
        Ok(())
    }

    /// Deep-merges `partial` into the node `id`.
    ///
    /// Top-level dotted keys are treated as relative paths; keys of nested
    /// mappings must be plain. A mapping merging into a mapping recurses;
    /// anything else replaces the existing entry. Every key is checked before
    /// the tree is touched. Returns whether anything changed.
    ///
    /// # Errors
    /// * `ConfigError::InvalidPath` - If a key is malformed
    /// * `ConfigError::NotFound` - If `id` is stale
    pub fn merge(&mut self, id: NodeId, partial: Map<String, Value>) -> Result<bool> {
        self.node(id)?;
        path::validate_partial(&partial)?;
        self.merge_checked(id, partial)
    }

    fn merge_checked(&mut self, id: NodeId, partial: Map<String, Value>) -> Result<bool> {
        let mut changed = false;

        for (key, value) in partial {
            let parts = path::split(&key)?;
            let Some((last, intermediate)) = parts.split_last() else {
                continue;
            };

            let mut current = id;
            for part in intermediate {
                let (child, fresh) = self.ensure_node(current, part);
                if fresh {
                    self.propagate_dirty(current);
                    changed = true;
                }
                current = child;
            }

            changed |= match (self.get(current, last)?, value) {
                (Some(Entry::Node(child)), Value::Object(map)) => self.merge_checked(child, map)?,
                (_, value) => self.store(current, last, value)?,
            };
        }

        Ok(changed)
    }

    /// Plain snapshot of the node `id` and everything below it.
    ///
    /// # Errors
    /// * `ConfigError::NotFound` - If `id` is stale
    pub fn flatten(&self, id: NodeId) -> Result<Snapshot> {
        let node = self.node(id)?;
        let mut out = Map::new();
        for (key, entry) in &node.entries {
            out.insert(key.clone(), self.entry_value(entry)?);
        }
        Ok(out)
    }

    /// Converts an entry to a plain value, flattening nodes.
    ///
    /// # Errors
    /// * `ConfigError::NotFound` - If the entry names a stale node
    pub fn entry_value(&self, entry: &Entry) -> Result<Value> {
        match entry {
            Entry::Leaf(value) => Ok(value.clone()),
            Entry::Node(child) => self.flatten(*child).map(Value::Object),
        }
    }

    /// Keys of the node `id` in insertion order.
    ///
    /// # Errors
    /// * `ConfigError::NotFound` - If `id` is stale
    pub fn keys(&self, id: NodeId) -> Result<Vec<String>> {
        Ok(self.node(id)?.entries.keys().cloned().collect())
    }

    /// Number of entries directly in the node `id`.
    ///
    /// # Errors
    /// * `ConfigError::NotFound` - If `id` is stale
    pub fn len(&self, id: NodeId) -> Result<usize> {
        Ok(self.node(id)?.entries.len())
    }

    /// Dotted path from the root to `id`; empty for the root.
    ///
    /// # Errors
    /// * `ConfigError::NotFound` - If `id` is stale
    pub fn path_of(&self, id: NodeId) -> Result<String> {
        let mut keys = Vec::new();
        let mut current = self.node(id)?;

        while let (Some(parent), Some(key)) = (current.parent, current.key_in_parent.as_deref()) {
            keys.push(key);
            current = self.node(parent)?;
        }

        keys.reverse();
        Ok(keys.join("."))
    }

    /// Parent of `id`, or `None` for the root.
    ///
    /// # Errors
    /// * `ConfigError::NotFound` - If `id` is stale
    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.node(id)?.parent)
    }

    fn node(&self, id: NodeId) -> Result<&NodeData> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
            .ok_or_else(|| ConfigError::NotFound(format!("node {id} no longer exists")))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut NodeData> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or_else(|| ConfigError::NotFound(format!("node {id} no longer exists")))
    }

    fn child_path(&self, id: NodeId, key: &str) -> Result<String> {
        Ok(path::child(&self.path_of(id)?, key))
    }

    fn child_nodes(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id)
            .map(|node| {
                node.entries
                    .values()
                    .filter_map(|entry| match entry {
                        Entry::Node(child) => Some(*child),
                        Entry::Leaf(_) => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(data);
            return NodeId {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            node: Some(data),
        });
        NodeId {
            index,
            generation: 0,
        }
    }

    fn free_subtree(&mut self, id: NodeId) {
        for child in self.child_nodes(id) {
            self.free_subtree(child);
        }

        let Some(slot) = self.slots.get_mut(id.index as usize) else {
            return;
        };
        if slot.generation == id.generation && slot.node.take().is_some() {
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(id.index);
        }
    }

    fn insert_node(&mut self, parent: NodeId, key: &str) -> NodeId {
        let child = self.alloc(NodeData::new(Some(parent), Some(key.to_string())));
        if let Ok(node) = self.node_mut(parent) {
            node.entries.insert(key.to_string(), Entry::Node(child));
        }
        child
    }

    /// Returns the child node under `key`, creating it or replacing a leaf.
    fn ensure_node(&mut self, parent: NodeId, key: &str) -> (NodeId, bool) {
        match self.node(parent).ok().and_then(|n| n.entries.get(key)) {
            Some(Entry::Node(child)) => (*child, false),
            Some(Entry::Leaf(_)) => {
                self.remove_entry(parent, key);
                (self.insert_node(parent, key), true)
            }
            None => (self.insert_node(parent, key), true),
        }
    }

    fn fill(&mut self, id: NodeId, snapshot: Snapshot) {
        for (key, value) in snapshot {
            match value {
                Value::Object(map) => {
                    let child = self.insert_node(id, &key);
                    self.fill(child, map);
                }
                leaf => {
                    if let Ok(node) = self.node_mut(id) {
                        node.entries.insert(key, Entry::Leaf(leaf));
                    }
                }
            }
        }
    }

    /// Unconditionally stores `value`, skipping equal values.
    fn store(&mut self, id: NodeId, key: &str, value: Value) -> Result<bool> {
        path::validate_key(key)?;

        if let Some(existing) = self.node(id)?.entries.get(key) {
            if self.entry_value(existing)? == value {
                return Ok(false);
            }
        }

        self.remove_entry(id, key);
        match value {
            Value::Object(map) => {
                let child = self.insert_node(id, key);
                self.fill(child, map);
            }
            leaf => {
                self.node_mut(id)?
                    .entries
                    .insert(key.to_string(), Entry::Leaf(leaf));
            }
        }

        self.propagate_dirty(id);
        Ok(true)
    }

    fn remove_entry(&mut self, id: NodeId, key: &str) {
        let removed = self
            .node_mut(id)
            .ok()
            .and_then(|node| node.entries.shift_remove(key));

        if let Some(Entry::Node(child)) = removed {
            self.free_subtree(child);
        }
    }

    /// Marks `id` and every ancestor as changed, then the tree as dirty.
    fn propagate_dirty(&mut self, id: NodeId) {
        let mut current = Some(id);
        while let Some(node_id) = current {
            current = match self.node_mut(node_id) {
                Ok(node) => {
                    node.revision += 1;
                    node.parent
                }
                Err(_) => None,
            };
        }
        self.dirty = true;
    }

    fn check_write(&self, parts: &[&str], value: &Value) -> Result<()> {
        let mut current = self.root;

        for (i, part) in parts.iter().enumerate() {
            let Some(entry) = self.node(current)?.entries.get(*part) else {
                return Ok(());
            };

            if i == parts.len() - 1 {
                if entry.is_node() != value.is_object() {
                    return Err(ConfigError::conflict(
                        path::prefix(parts, i + 1),
                        class_mismatch(entry),
                    ));
                }
                return Ok(());
            }

            match entry {
                Entry::Node(child) => current = *child,
                Entry::Leaf(_) => {
                    return Err(ConfigError::conflict(
                        path::prefix(parts, i + 1),
                        "holds a value, not a mapping",
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Rejects mapping values whose keys cannot be stored.
fn validate_value(value: &Value) -> Result<()> {
    match value {
        Value::Object(map) => path::validate_snapshot(map),
        _ => Ok(()),
    }
}

fn class_mismatch(existing: &Entry) -> &'static str {
    if existing.is_node() {
        "holds a mapping; pass overwrite to replace it with a value"
    } else {
        "holds a value; pass overwrite to replace it with a mapping"
    }
}

#[cfg(test)]
mod tests;
