//! Weak registry of resident objects
//!
//! Guarantees one live instance per ObjectId within a workspace. Entries do
//! not keep objects alive; a dropped object stays in the map as a dead entry
//! until [`IdentityMap::cleanup`] or [`IdentityMap::remove`].

use crate::object::{ObjectCell, WeakObjectCell};
use rustc_hash::FxHashMap;
use statejournal_core::{Error, ObjectId, Result};

/// ObjectId → weak object reference
#[derive(Debug, Default)]
pub struct IdentityMap {
    entries: FxHashMap<ObjectId, WeakObjectCell>,
}

impl IdentityMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `cell` under its ObjectId
    ///
    /// Re-adding the same instance is a no-op. Adding a different instance
    /// while the registered one is alive is an error; a dead entry is
    /// replaced.
    pub fn add(&mut self, cell: &ObjectCell) -> Result<()> {
        let object_id = cell.object_id();
        if let Some(existing) = self.entries.get(&object_id).and_then(WeakObjectCell::upgrade) {
            if existing.ptr_eq(cell) {
                return Ok(());
            }
            return Err(Error::InvalidArgument(format!(
                "a different live instance of object {} is already registered",
                object_id
            )));
        }
        self.entries.insert(object_id, cell.downgrade());
        Ok(())
    }

    /// Live instance for `object_id`
    pub fn try_get(&self, object_id: ObjectId) -> Option<ObjectCell> {
        self.entries.get(&object_id)?.upgrade()
    }

    /// Drop the entry, returning whether one existed
    pub fn remove(&mut self, object_id: ObjectId) -> bool {
        self.entries.remove(&object_id).is_some()
    }

    /// Evict dead entries, returning how many were removed
    pub fn cleanup(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, weak| !weak.is_dead());
        before - self.entries.len()
    }

    /// Number of entries, dead ones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if there are no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
