//! Version index: ObjectId → position of the object's latest version
//!
//! Stored as an ordinary [`DurableDict`] under the well-known id 0 whose
//! values are all `Ptr64`. Each commit that writes objects also writes the
//! index's own diff; the position of that frame is the VersionIndexPtr.

use crate::object::{DurableDict, DurableObject};
use statejournal_core::{Error, ObjectId, Result, Value};
use std::collections::BTreeMap;
use std::io::Write;

/// Latest-version pointers of every committed object
#[derive(Debug)]
pub struct VersionIndex {
    dict: DurableDict,
}

impl VersionIndex {
    /// Empty index of a fresh journal
    pub fn new() -> Self {
        Self::from_committed(BTreeMap::new())
    }

    /// Index restored from a materialized map
    pub fn from_committed(committed: BTreeMap<u64, Value>) -> Self {
        Self {
            dict: DurableDict::from_committed(ObjectId::VERSION_INDEX, committed),
        }
    }

    /// Latest version position of `object_id`
    pub fn get(&self, object_id: ObjectId) -> Result<Option<u64>> {
        match self.dict.get(object_id.get())? {
            None => Ok(None),
            Some(Value::Ptr64(ptr)) => Ok(Some(*ptr)),
            Some(other) => Err(Error::Internal(format!(
                "version index entry for {} holds {} instead of Ptr64",
                object_id,
                other.type_name()
            ))),
        }
    }

    /// Stage a new latest version for `object_id`
    pub fn stage(&mut self, object_id: ObjectId, position: u64) -> Result<()> {
        self.dict.set(object_id.get(), Value::Ptr64(position))
    }

    /// Whether positions are staged
    pub fn has_changes(&self) -> Result<bool> {
        self.dict.has_changes()
    }

    /// Diff of the staged positions
    pub fn write_pending_diff(&self, out: &mut dyn Write) -> Result<()> {
        self.dict.write_pending_diff(out)
    }

    /// Make staged positions committed
    pub fn on_commit_succeeded(&mut self) -> Result<()> {
        self.dict.on_commit_succeeded()
    }

    /// Drop staged positions
    pub fn discard_changes(&mut self) {
        self.dict.discard_changes();
    }

    /// Number of indexed objects
    pub fn len(&self) -> Result<usize> {
        self.dict.len()
    }

    /// True if no object is indexed
    pub fn is_empty(&self) -> Result<bool> {
        self.dict.is_empty()
    }

    /// One past the largest indexed id, never below the first user id
    pub fn compute_next_object_id(&self) -> Result<ObjectId> {
        let max = self.dict.keys()?.last().copied();
        match max {
            Some(id) if id >= ObjectId::FIRST_USER.get() => {
                ObjectId::new(id)
                    .checked_next()
                    .ok_or_else(|| Error::DiffPayloadFormat {
                        message: format!("version index holds object id {}, past the id space", id),
                    })
            }
            _ => Ok(ObjectId::FIRST_USER),
        }
    }
}

impl Default for VersionIndex {
    fn default() -> Self {
        Self::new()
    }
}
