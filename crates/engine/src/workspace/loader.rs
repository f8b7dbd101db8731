//! Object loading
//!
//! [`ObjectLoader`] is the seam through which a workspace materializes
//! objects that are not resident. Any `Fn(ObjectId) -> Result<ObjectCell>`
//! is a loader; [`LogObjectLoader`] is the one backed by a data log.
//!
//! ## Materialization
//!
//! An object's versions form a backward chain of frames linked by their
//! PrevVersionPtr. Loading walks the chain from the head recorded in the
//! version index back to the first version, then applies the diffs oldest
//! first.

use super::commit::CommitContext;
use crate::object::{DurableDict, ObjectCell};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use statejournal_core::{Error, ObjectId, Result, Value};
use statejournal_storage::format::object_version::PREV_PTR_SIZE;
use statejournal_storage::{LogSource, ObjectKind, ObjectVersionRecord, SharedLog};
use std::collections::BTreeMap;
use tracing::debug;

/// Materializes objects that are not resident in a workspace
pub trait ObjectLoader: Send + Sync {
    /// Load `object_id`; `Error::ObjectNotFound` if storage has no such object
    fn load(&self, object_id: ObjectId) -> Result<ObjectCell>;

    /// Observe a finalized commit
    fn on_commit(&self, _context: &CommitContext) {}
}

impl<F> ObjectLoader for F
where
    F: Fn(ObjectId) -> Result<ObjectCell> + Send + Sync,
{
    fn load(&self, object_id: ObjectId) -> Result<ObjectCell> {
        self(object_id)
    }
}

/// Fold the version chain starting at `head` into a committed map
pub fn materialize_dict(
    log: &dyn LogSource,
    object_id: ObjectId,
    head: u64,
) -> Result<BTreeMap<u64, Value>> {
    let mut chain = Vec::new();
    let mut position = head;
    while position != 0 {
        let (tag, payload) = log.read_frame_owned(position)?;
        if tag.object_kind() != Some(ObjectKind::Dict) {
            return Err(Error::FrameCorrupt {
                position,
                reason: format!("object {} version has frame tag {}", object_id, tag),
            });
        }
        let prev = ObjectVersionRecord::parse(&payload)?.prev_version_ptr;
        if prev >= position {
            return Err(Error::FrameCorrupt {
                position,
                reason: format!(
                    "version chain of object {} points forward to {}",
                    object_id, prev
                ),
            });
        }
        chain.push(payload);
        position = prev;
    }

    let mut committed = BTreeMap::new();
    for payload in chain.iter().rev() {
        DurableDict::apply_diff(&mut committed, &payload[PREV_PTR_SIZE..])?;
    }
    debug!(
        object_id = %object_id,
        versions = chain.len(),
        keys = committed.len(),
        "Materialized object"
    );
    Ok(committed)
}

/// Loader that reads object versions from a data log
pub struct LogObjectLoader<L: LogSource = SharedLog> {
    log: L,
    heads: RwLock<FxHashMap<ObjectId, u64>>,
}

impl<L: LogSource> LogObjectLoader<L> {
    /// Build a loader from the version index at `version_index_ptr`
    ///
    /// A pointer of 0 means no commit has written objects yet.
    pub fn new(log: L, version_index_ptr: u64) -> Result<Self> {
        let index = materialize_dict(&log, ObjectId::VERSION_INDEX, version_index_ptr)?;
        let mut heads = FxHashMap::default();
        for (key, value) in index {
            let ptr = value.as_ptr64().ok_or_else(|| Error::DiffPayloadFormat {
                message: format!(
                    "version index entry {} holds {} instead of Ptr64",
                    key,
                    value.type_name()
                ),
            })?;
            heads.insert(ObjectId::new(key), ptr);
        }
        Ok(Self {
            log,
            heads: RwLock::new(heads),
        })
    }

    /// Latest version position of `object_id`
    pub fn head(&self, object_id: ObjectId) -> Option<u64> {
        self.heads.read().get(&object_id).copied()
    }

    /// Number of objects the loader can materialize
    pub fn len(&self) -> usize {
        self.heads.read().len()
    }

    /// True if the loader knows no objects
    pub fn is_empty(&self) -> bool {
        self.heads.read().is_empty()
    }
}

impl<L: LogSource> ObjectLoader for LogObjectLoader<L> {
    fn load(&self, object_id: ObjectId) -> Result<ObjectCell> {
        let head = self
            .head(object_id)
            .ok_or(Error::ObjectNotFound { object_id })?;
        let committed = materialize_dict(&self.log, object_id, head)?;
        Ok(ObjectCell::new(DurableDict::from_committed(object_id, committed)))
    }

    fn on_commit(&self, context: &CommitContext) {
        let mut heads = self.heads.write();
        for record in &context.written_records {
            if record.object_id != ObjectId::VERSION_INDEX {
                heads.insert(record.object_id, record.position);
            }
        }
    }
}
