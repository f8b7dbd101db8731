//! Strong registry of objects with uncommitted state
//!
//! Holding a strong reference keeps a dirty object alive even after the
//! application drops its own handle, so its edits still reach the next
//! commit. The set is the commit work-list.

use crate::object::ObjectCell;
use rustc_hash::FxHashMap;
use statejournal_core::ObjectId;

/// ObjectId → strong object reference
#[derive(Debug, Default)]
pub struct DirtySet {
    entries: FxHashMap<ObjectId, ObjectCell>,
}

impl DirtySet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `cell` (idempotent)
    pub fn add(&mut self, cell: ObjectCell) {
        self.entries.insert(cell.object_id(), cell);
    }

    /// Whether `object_id` is a member
    pub fn contains(&self, object_id: ObjectId) -> bool {
        self.entries.contains_key(&object_id)
    }

    /// Remove a member, returning whether it was present
    pub fn remove(&mut self, object_id: ObjectId) -> bool {
        self.entries.remove(&object_id).is_some()
    }

    /// All members, ascending by ObjectId
    pub fn get_all(&self) -> Vec<ObjectCell> {
        let mut cells: Vec<ObjectCell> = self.entries.values().cloned().collect();
        cells.sort_by_key(ObjectCell::object_id);
        cells
    }

    /// Drop every member
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if there are no members
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{DurableDict, DurableType};

    fn cell(id: u64) -> ObjectCell {
        ObjectCell::new(DurableDict::new_transient(ObjectId::new(id)))
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut set = DirtySet::new();
        let a = cell(16);
        set.add(a.clone());
        set.add(a);
        assert_eq!(set.len(), 1);
        assert!(set.contains(ObjectId::new(16)));
    }

    #[test]
    fn test_keeps_objects_alive() {
        let mut set = DirtySet::new();
        let a = cell(16);
        let weak = a.downgrade();
        set.add(a);
        assert!(weak.upgrade().is_some());

        assert!(set.remove(ObjectId::new(16)));
        assert!(weak.upgrade().is_none());
        assert!(!set.remove(ObjectId::new(16)));
    }

    #[test]
    fn test_get_all_sorted_and_clear() {
        let mut set = DirtySet::new();
        for id in [30, 16, 20] {
            set.add(cell(id));
        }
        let ids: Vec<u64> = set.get_all().iter().map(|c| c.object_id().get()).collect();
        assert_eq!(ids, vec![16, 20, 30]);

        set.clear();
        assert!(set.is_empty());
    }
}
