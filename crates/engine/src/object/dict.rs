//! DurableDict: a u64-keyed durable dictionary
//!
//! ## Storage
//!
//! - `committed`: the baseline as of the last commit, never holds tombstones
//! - `working`: sorted edits since then, each a [`Edit::Set`] or an
//!   [`Edit::Remove`] of a committed key
//!
//! An edit that restores the committed value cancels itself, so the overlay
//! only ever holds real changes and `has_changes` is `!working.is_empty()`.
//!
//! ## Persistable Values
//!
//! | Value | Written as |
//! |-------|------------|
//! | `Null` | Null |
//! | `Int` | VarInt |
//! | `ObjRef` | ObjRef |
//! | `Ptr64` | Ptr64 |
//!
//! Other variants can be stored but make `write_pending_diff` fail.

use super::{DirtyNotifier, DurableObject, DurableObjectState, DurableType};
use statejournal_core::{Error, ObjectId, Result, Value};
use statejournal_storage::format::diff_payload::{DiffPayloadReader, DiffPayloadWriter};
use statejournal_storage::ObjectKind;
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

/// One pending change
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    /// Upsert (an explicit null is `Set(Value::Null)`)
    Set(Value),
    /// Delete a committed key
    Remove,
}

/// Durable dictionary keyed by `u64`
#[derive(Debug)]
pub struct DurableDict {
    object_id: ObjectId,
    state: DurableObjectState,
    committed: BTreeMap<u64, Value>,
    working: BTreeMap<u64, Edit>,
    notifier: Option<DirtyNotifier>,
}

impl DurableDict {
    /// A Clean dictionary holding `committed`, as produced by a loader
    pub fn from_committed(object_id: ObjectId, committed: BTreeMap<u64, Value>) -> Self {
        Self {
            object_id,
            state: DurableObjectState::Clean,
            committed,
            working: BTreeMap::new(),
            notifier: None,
        }
    }

    fn ensure_attached(&self) -> Result<()> {
        if self.state == DurableObjectState::Detached {
            return Err(Error::ObjectDetached {
                object_id: self.object_id,
            });
        }
        Ok(())
    }

    /// Clean → PersistentDirty once the overlay holds something
    fn mark_dirty(&mut self) {
        if self.state == DurableObjectState::Clean && !self.working.is_empty() {
            self.state = DurableObjectState::PersistentDirty;
            if let Some(notifier) = &self.notifier {
                notifier.notify();
            }
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Value under `key`, `None` if absent
    pub fn get(&self, key: u64) -> Result<Option<&Value>> {
        self.ensure_attached()?;
        Ok(match self.working.get(&key) {
            Some(Edit::Set(value)) => Some(value),
            Some(Edit::Remove) => None,
            None => self.committed.get(&key),
        })
    }

    /// Cloned value under `key`, `None` if absent
    pub fn try_get_value(&self, key: u64) -> Result<Option<Value>> {
        Ok(self.get(key)?.cloned())
    }

    /// Whether `key` is present
    pub fn contains_key(&self, key: u64) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Number of visible keys
    pub fn len(&self) -> Result<usize> {
        self.ensure_attached()?;
        let mut len = self.committed.len();
        for (key, edit) in &self.working {
            match edit {
                Edit::Set(_) if !self.committed.contains_key(key) => len += 1,
                Edit::Set(_) => {}
                Edit::Remove => len -= 1,
            }
        }
        Ok(len)
    }

    /// True if no key is visible
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Visible keys in ascending order
    pub fn keys(&self) -> Result<Vec<u64>> {
        Ok(self.entries()?.into_iter().map(|(k, _)| k).collect())
    }

    /// Visible entries in ascending key order
    pub fn entries(&self) -> Result<Vec<(u64, &Value)>> {
        self.ensure_attached()?;
        let mut merged: BTreeMap<u64, &Value> =
            self.committed.iter().map(|(k, v)| (*k, v)).collect();
        for (key, edit) in &self.working {
            match edit {
                Edit::Set(value) => {
                    merged.insert(*key, value);
                }
                Edit::Remove => {
                    merged.remove(key);
                }
            }
        }
        Ok(merged.into_iter().collect())
    }

    /// Pending edits in ascending key order
    pub fn pending_edits(&self) -> Result<&BTreeMap<u64, Edit>> {
        self.ensure_attached()?;
        Ok(&self.working)
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Insert or overwrite `key`
    pub fn set(&mut self, key: u64, value: impl Into<Value>) -> Result<()> {
        self.ensure_attached()?;
        let value = value.into();
        if self.committed.get(&key) == Some(&value) {
            self.working.remove(&key);
        } else {
            self.working.insert(key, Edit::Set(value));
        }
        self.mark_dirty();
        Ok(())
    }

    /// Store an explicit null under `key`
    pub fn set_null(&mut self, key: u64) -> Result<()> {
        self.set(key, Value::Null)
    }

    /// Delete `key`, returning whether it was present
    pub fn remove(&mut self, key: u64) -> Result<bool> {
        self.ensure_attached()?;
        let present = self.get(key)?.is_some();
        if self.committed.contains_key(&key) {
            self.working.insert(key, Edit::Remove);
        } else {
            self.working.remove(&key);
        }
        if present {
            self.mark_dirty();
        }
        Ok(present)
    }

    /// Apply a diff payload to a baseline map (Tombstone deletes)
    pub fn apply_diff(baseline: &mut BTreeMap<u64, Value>, payload: &[u8]) -> Result<()> {
        let mut reader = DiffPayloadReader::new(payload)?;
        while let Some(pair) = reader.try_read_next()? {
            match pair.value()? {
                Some(value) => {
                    baseline.insert(pair.key, value);
                }
                None => {
                    baseline.remove(&pair.key);
                }
            }
        }
        Ok(())
    }
}

impl DurableObject for DurableDict {
    fn object_id(&self) -> ObjectId {
        self.object_id
    }

    fn state(&self) -> DurableObjectState {
        self.state
    }

    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn object_kind(&self) -> ObjectKind {
        ObjectKind::Dict
    }

    fn has_changes(&self) -> Result<bool> {
        self.ensure_attached()?;
        Ok(!self.working.is_empty())
    }

    fn write_pending_diff(&self, out: &mut dyn Write) -> Result<()> {
        self.ensure_attached()?;
        let mut writer = DiffPayloadWriter::new(out);
        for (key, edit) in &self.working {
            match edit {
                Edit::Set(value) => writer.write_value(*key, value)?,
                Edit::Remove => writer.write_tombstone(*key)?,
            }
        }
        writer.complete()?;
        Ok(())
    }

    fn on_commit_succeeded(&mut self) -> Result<()> {
        self.ensure_attached()?;
        for (key, edit) in std::mem::take(&mut self.working) {
            match edit {
                Edit::Set(value) => {
                    self.committed.insert(key, value);
                }
                Edit::Remove => {
                    self.committed.remove(&key);
                }
            }
        }
        self.state = DurableObjectState::Clean;
        Ok(())
    }

    fn on_diff_committed(&mut self, diff: &[u8]) -> Result<()> {
        self.ensure_attached()?;
        let mut baseline = self.committed.clone();
        Self::apply_diff(&mut baseline, diff)?;

        let mut touched: BTreeSet<u64> = self.working.keys().copied().collect();
        let mut reader = DiffPayloadReader::new(diff)?;
        let written = reader.pair_count() > 0;
        while let Some(pair) = reader.try_read_next()? {
            touched.insert(pair.key);
        }

        let mut working = BTreeMap::new();
        for key in touched {
            let visible = match self.working.get(&key) {
                Some(Edit::Set(value)) => Some(value),
                Some(Edit::Remove) => None,
                None => self.committed.get(&key),
            };
            if visible != baseline.get(&key) {
                let edit = match visible {
                    Some(value) => Edit::Set(value.clone()),
                    None => Edit::Remove,
                };
                working.insert(key, edit);
            }
        }

        self.committed = baseline;
        self.working = working;
        self.state = if self.working.is_empty() {
            DurableObjectState::Clean
        } else if written {
            DurableObjectState::PersistentDirty
        } else {
            self.state
        };
        Ok(())
    }

    fn discard_changes(&mut self) {
        match self.state {
            DurableObjectState::Clean | DurableObjectState::Detached => {}
            DurableObjectState::PersistentDirty => {
                self.working.clear();
                self.state = DurableObjectState::Clean;
            }
            DurableObjectState::TransientDirty => {
                self.working.clear();
                self.committed.clear();
                self.state = DurableObjectState::Detached;
            }
        }
    }

    fn attach_notifier(&mut self, notifier: DirtyNotifier) {
        self.notifier = Some(notifier);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl DurableType for DurableDict {
    const TYPE_NAME: &'static str = "DurableDict";

    fn new_transient(object_id: ObjectId) -> Self {
        Self {
            object_id,
            state: DurableObjectState::TransientDirty,
            committed: BTreeMap::new(),
            working: BTreeMap::new(),
            notifier: None,
        }
    }
}
