//! Workspace: identity, dirty tracking and two-phase commit
//!
//! A [`Workspace`] is a cheap-to-clone handle. It owns:
//! - the ObjectId allocator (ids start at 16 and are never reused)
//! - the [`IdentityMap`] (weak, one live instance per id)
//! - the [`DirtySet`] (strong, the commit work-list)
//! - the [`VersionIndex`] and the data/meta logs
//! - the watermarks `epoch_seq`, `data_tail` and `version_index_ptr`
//!
//! # Example
//!
//! ```
//! use statejournal_engine::{DurableDict, DurableObject, DurableObjectState, Workspace};
//!
//! let ws = Workspace::new();
//! let dict = ws.create_object::<DurableDict>().unwrap();
//! dict.write().set(10, 100).unwrap();
//!
//! let ctx = ws.commit().unwrap();
//! assert_eq!(ctx.epoch_seq, 1);
//! assert_eq!(dict.read().state(), DurableObjectState::Clean);
//! ```
//!
//! # Locking
//!
//! The workspace is single-writer. Object guards (`dict.write()`) must be
//! released before calling `commit`, which locks every dirty object.

pub mod commit;
pub mod dirty_set;
pub mod identity_map;
pub mod lazy_ref;
pub mod loader;
pub mod version_index;

pub use commit::{CommitContext, WrittenRecord};

use commit::CapturedObject;
pub use dirty_set::DirtySet;
pub use identity_map::IdentityMap;
pub use lazy_ref::LazyRef;
pub use loader::{materialize_dict, LogObjectLoader, ObjectLoader};
pub use version_index::VersionIndex;

use crate::object::{
    DirtyNotifier, DurableObject, DurableObjectState, DurableType, ObjectCell, Shared,
};
use parking_lot::{Mutex, RwLock};
use statejournal_core::{Error, ObjectId, Result};
use statejournal_durability::{recover_logs, RecoveryInfo};
use statejournal_storage::format::object_version::NO_PREVIOUS_VERSION;
use statejournal_storage::{FrameTag, Log, LogSink, MemoryLog, SharedLog};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

struct WorkspaceState {
    next_object_id: ObjectId,
    epoch_seq: u64,
    data_tail: u64,
    version_index_ptr: u64,
    root_object_id: Option<ObjectId>,
    version_index: VersionIndex,
}

struct WorkspaceInner {
    state: Mutex<WorkspaceState>,
    identity: Mutex<IdentityMap>,
    dirty: Arc<Mutex<DirtySet>>,
    data_log: Mutex<Box<dyn Log>>,
    meta_log: Option<Mutex<Box<dyn LogSink>>>,
    loader: Option<Arc<dyn ObjectLoader>>,
}

/// Handle to a journal workspace
#[derive(Clone)]
pub struct Workspace {
    inner: Arc<WorkspaceInner>,
}

impl Workspace {
    /// Fresh workspace: next id 16, no loader, in-memory data log
    pub fn new() -> Self {
        WorkspaceBuilder::new().assemble(
            ObjectId::FIRST_USER,
            Box::new(MemoryLog::new()),
            VersionIndex::new(),
        )
    }

    /// Create a builder for workspace configuration.
    ///
    /// # Example
    ///
    /// ```
    /// use statejournal_engine::Workspace;
    ///
    /// let ws = Workspace::builder().next_object_id(100).build().unwrap();
    /// assert_eq!(ws.next_object_id().get(), 100);
    /// ```
    pub fn builder() -> WorkspaceBuilder {
        WorkspaceBuilder::new()
    }

    /// Reopen over a data log at a recovered state
    ///
    /// Objects are loaded from the log on demand.
    pub fn open(data_log: SharedLog, info: &RecoveryInfo) -> Result<Self> {
        Self::open_with(data_log, None, info)
    }

    /// Recover both logs, then reopen over them
    ///
    /// Torn or uncommitted bytes are cut from both logs first. Later commits
    /// append meta records to `meta_log`.
    pub fn open_logs(data_log: SharedLog, meta_log: SharedLog) -> Result<Self> {
        let info = {
            let mut meta = meta_log.lock();
            let mut data = data_log.lock();
            recover_logs(&mut meta, &mut data)?
        };
        Self::open_with(data_log, Some(meta_log), &info)
    }

    fn open_with(
        data_log: SharedLog,
        meta_log: Option<SharedLog>,
        info: &RecoveryInfo,
    ) -> Result<Self> {
        let loader = LogObjectLoader::new(data_log.clone(), info.version_index_ptr)?;
        let mut builder = Self::builder()
            .recovered(info)
            .log(data_log)
            .loader(loader);
        if let Some(meta) = meta_log {
            builder = builder.meta_log(meta);
        }
        builder.build()
    }

    // ========================================================================
    // Objects
    // ========================================================================

    /// Create a new object with the next ObjectId
    ///
    /// The object starts TransientDirty and is registered in both the
    /// identity map and the dirty set.
    pub fn create_object<T: DurableType>(&self) -> Result<Shared<T>> {
        let object_id = {
            let mut state = self.inner.state.lock();
            let id = state.next_object_id;
            if id.get() == u64::MAX {
                return Err(Error::InvalidOperation(
                    "object id space exhausted".to_string(),
                ));
            }
            state.next_object_id = id.next();
            id
        };

        let shared = Arc::new(RwLock::new(T::new_transient(object_id)));
        let cell = ObjectCell::from_shared(shared.clone());
        shared
            .write()
            .attach_notifier(DirtyNotifier::new(&self.inner.dirty, &cell));
        self.inner.identity.lock().add(&cell)?;
        self.inner.dirty.lock().add(cell);

        debug!(object_id = %object_id, type_name = T::TYPE_NAME, "Created object");
        Ok(shared)
    }

    /// Resolve `object_id` as a `T`
    ///
    /// A resident instance is returned as is. Otherwise the loader is asked;
    /// its errors propagate unchanged. Loaded objects join the identity map
    /// but not the dirty set.
    pub fn load_object<T: DurableType>(&self, object_id: ObjectId) -> Result<Shared<T>> {
        let resident = self.inner.identity.lock().try_get(object_id);
        if let Some(cell) = resident {
            return cell.downcast::<T>();
        }

        let loader = self
            .inner
            .loader
            .as_ref()
            .ok_or(Error::ObjectNotFound { object_id })?;
        let cell = loader.load(object_id)?;
        if cell.object_id() != object_id {
            return Err(Error::Internal(format!(
                "loader returned object {} when asked for {}",
                cell.object_id(),
                object_id
            )));
        }
        let typed = cell.downcast::<T>()?;

        let mut identity = self.inner.identity.lock();
        if let Some(existing) = identity.try_get(object_id) {
            return existing.downcast::<T>();
        }
        typed
            .write()
            .attach_notifier(DirtyNotifier::new(&self.inner.dirty, &cell));
        identity.add(&cell)?;

        debug!(object_id = %object_id, type_name = T::TYPE_NAME, "Loaded object");
        Ok(typed)
    }

    /// Record the root object carried by later commits
    pub fn set_root(&self, object_id: ObjectId) {
        self.inner.state.lock().root_object_id = Some(object_id);
    }

    /// Root object, if one was set or recovered
    pub fn root_object_id(&self) -> Option<ObjectId> {
        self.inner.state.lock().root_object_id
    }

    // ========================================================================
    // Commit
    // ========================================================================

    /// Phase one: write every changed object to the data log
    ///
    /// No object's committed state changes. A context that is never
    /// finalized is abandoned; the next prepare starts over.
    pub fn prepare_commit(&self) -> Result<CommitContext> {
        let mut state = self.inner.state.lock();
        let mut log = self.inner.data_log.lock();
        state.version_index.discard_changes();

        let dirty = self.inner.dirty.lock().get_all();
        let mut context = CommitContext::new(
            state.epoch_seq + 1,
            state.data_tail,
            state.version_index_ptr,
            state.root_object_id,
        );

        if let Err(e) = write_changes(&mut state, &mut **log, dirty, &mut context) {
            state.version_index.discard_changes();
            warn!(epoch_seq = context.epoch_seq, error = %e, "Prepare commit failed");
            return Err(e);
        }

        debug!(
            epoch_seq = context.epoch_seq,
            dirty = context.captured.len(),
            written = context.written_records.len(),
            "Prepared commit"
        );
        Ok(context)
    }

    /// Phase two: apply a prepared context
    ///
    /// Every captured object folds the diff prepare wrote for it. Objects
    /// edited since prepare keep those edits pending and stay in the dirty
    /// set; the rest leave it. The watermarks advance to the context's
    /// values.
    pub fn finalize_commit(&self, context: &mut CommitContext) -> Result<()> {
        let mut state = self.inner.state.lock();
        if context.epoch_seq != state.epoch_seq + 1 {
            return Err(Error::InvalidOperation(format!(
                "commit context for epoch {} does not follow epoch {}",
                context.epoch_seq, state.epoch_seq
            )));
        }

        for captured in context.captured.drain(..) {
            let still_dirty = {
                let mut object = captured.cell.write();
                if object.state() == DurableObjectState::Detached {
                    false
                } else {
                    let diff = match captured.written {
                        Some(index) => context.written_records[index].diff_payload.as_slice(),
                        None => EMPTY_DIFF,
                    };
                    object.on_diff_committed(diff)?;
                    object.state().is_dirty()
                }
            };
            if still_dirty {
                debug!(
                    object_id = %captured.cell.object_id(),
                    "Object changed after prepare, keeping it dirty"
                );
            } else {
                self.inner.dirty.lock().remove(captured.cell.object_id());
            }
        }

        state.version_index.on_commit_succeeded()?;
        state.epoch_seq = context.epoch_seq;
        state.data_tail = context.data_tail;
        state.version_index_ptr = context.version_index_ptr;
        drop(state);

        if let Some(loader) = &self.inner.loader {
            loader.on_commit(context);
        }
        info!(
            epoch_seq = context.epoch_seq,
            records = context.written_records.len(),
            data_tail = context.data_tail,
            version_index_ptr = context.version_index_ptr,
            "Commit finalized"
        );
        Ok(())
    }

    /// Prepare, record the commit point, finalize
    ///
    /// Always advances `epoch_seq`, even with nothing to write.
    pub fn commit(&self) -> Result<CommitContext> {
        let mut context = self.prepare_commit()?;

        if let Some(meta_log) = &self.inner.meta_log {
            let next_object_id = self.inner.state.lock().next_object_id;
            let record = context.build_meta_commit_record(next_object_id);
            let appended = record
                .encode()
                .and_then(|body| meta_log.lock().append(FrameTag::META_COMMIT, &body));
            if let Err(e) = appended {
                self.inner.state.lock().version_index.discard_changes();
                warn!(epoch_seq = context.epoch_seq, error = %e, "Meta record write failed");
                return Err(e);
            }
        }

        self.finalize_commit(&mut context)?;
        Ok(context)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Next id `create_object` will hand out
    pub fn next_object_id(&self) -> ObjectId {
        self.inner.state.lock().next_object_id
    }

    /// Number of completed commits
    pub fn epoch_seq(&self) -> u64 {
        self.inner.state.lock().epoch_seq
    }

    /// Data log length at the last commit
    pub fn data_tail(&self) -> u64 {
        self.inner.state.lock().data_tail
    }

    /// Position of the last committed version index
    pub fn version_index_ptr(&self) -> u64 {
        self.inner.state.lock().version_index_ptr
    }

    /// Latest committed version position of `object_id`
    pub fn version_of(&self, object_id: ObjectId) -> Result<Option<u64>> {
        self.inner.state.lock().version_index.get(object_id)
    }

    /// Objects with uncommitted state
    pub fn dirty_count(&self) -> usize {
        self.inner.dirty.lock().len()
    }

    /// Whether `object_id` is in the dirty set
    pub fn is_dirty(&self, object_id: ObjectId) -> bool {
        self.inner.dirty.lock().contains(object_id)
    }

    /// Identity map entries, dead ones included
    pub fn cached_count(&self) -> usize {
        self.inner.identity.lock().len()
    }

    /// Evict dead identity map entries, returning how many were removed
    pub fn cleanup(&self) -> usize {
        self.inner.identity.lock().cleanup()
    }

    /// Release the dirty set's strong references
    ///
    /// Uncommitted edits of objects no longer referenced elsewhere are lost.
    pub fn dispose(&self) {
        let mut dirty = self.inner.dirty.lock();
        if !dirty.is_empty() {
            debug!(dirty = dirty.len(), "Disposing workspace with uncommitted objects");
        }
        dirty.clear();
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Workspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Workspace")
            .field("next_object_id", &state.next_object_id)
            .field("epoch_seq", &state.epoch_seq)
            .field("data_tail", &state.data_tail)
            .field("version_index_ptr", &state.version_index_ptr)
            .finish()
    }
}

/// Diff payload with no pairs
const EMPTY_DIFF: &[u8] = &[0x00];

/// Capture `dirty` and write the diff of every changed object, then the
/// version index
fn write_changes(
    state: &mut WorkspaceState,
    log: &mut dyn Log,
    dirty: Vec<ObjectCell>,
    context: &mut CommitContext,
) -> Result<()> {
    let mut staged = Vec::new();
    for cell in dirty {
        let object = cell.read();
        if object.state() == DurableObjectState::Detached || !object.has_changes()? {
            drop(object);
            context.captured.push(CapturedObject {
                cell,
                written: None,
            });
            continue;
        }
        let mut diff = Vec::new();
        object.write_pending_diff(&mut diff)?;
        let tag = FrameTag::object_version(object.object_kind());
        drop(object);

        let object_id = cell.object_id();
        let prev = state
            .version_index
            .get(object_id)?
            .unwrap_or(NO_PREVIOUS_VERSION);
        let position = context.write_object_version(log, object_id, prev, &diff, tag)?;
        debug!(object_id = %object_id, position, bytes = diff.len(), "Wrote object version");
        staged.push((object_id, position));
        context.captured.push(CapturedObject {
            cell,
            written: Some(context.written_records.len() - 1),
        });
    }

    if staged.is_empty() {
        return Ok(());
    }
    for (object_id, position) in staged {
        state.version_index.stage(object_id, position)?;
    }
    let mut diff = Vec::new();
    state.version_index.write_pending_diff(&mut diff)?;
    context.version_index_ptr = context.write_object_version(
        log,
        ObjectId::VERSION_INDEX,
        state.version_index_ptr,
        &diff,
        FrameTag::DICT_VERSION,
    )?;
    Ok(())
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for workspace configuration.
///
/// # Example
///
/// ```
/// use statejournal_engine::Workspace;
/// use statejournal_storage::MemoryLog;
///
/// let data = MemoryLog::shared();
/// let meta = MemoryLog::shared();
/// let ws = Workspace::builder()
///     .log(data)
///     .meta_log(meta)
///     .build()
///     .unwrap();
/// assert_eq!(ws.epoch_seq(), 0);
/// ```
#[derive(Default)]
pub struct WorkspaceBuilder {
    next_object_id: Option<u64>,
    loader: Option<Arc<dyn ObjectLoader>>,
    data_log: Option<Box<dyn Log>>,
    meta_log: Option<Box<dyn LogSink>>,
    recovered: Option<RecoveryInfo>,
}

impl WorkspaceBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// First ObjectId to allocate (at least 16)
    pub fn next_object_id(mut self, next_object_id: u64) -> Self {
        self.next_object_id = Some(next_object_id);
        self
    }

    /// Loader for objects that are not resident
    pub fn loader(mut self, loader: impl ObjectLoader + 'static) -> Self {
        self.loader = Some(Arc::new(loader));
        self
    }

    /// Data log object versions are appended to (default: in-memory)
    pub fn log(mut self, log: impl Log + 'static) -> Self {
        self.data_log = Some(Box::new(log));
        self
    }

    /// Meta log that receives one commit record per epoch
    pub fn meta_log(mut self, log: impl LogSink + 'static) -> Self {
        self.meta_log = Some(Box::new(log));
        self
    }

    /// Start from a recovered state
    ///
    /// The version index is read back from the data log at the recovered
    /// VersionIndexPtr, so the data log must be the one recovered from.
    /// An explicit [`next_object_id`](Self::next_object_id) still wins over
    /// the recovered one, but never goes below an indexed id.
    pub fn recovered(mut self, info: &RecoveryInfo) -> Self {
        self.recovered = Some(*info);
        self
    }

    /// Validate and build the workspace
    pub fn build(mut self) -> Result<Workspace> {
        let mut next = self
            .next_object_id
            .or(self.recovered.map(|info| info.next_object_id.get()))
            .unwrap_or(ObjectId::FIRST_USER.get());
        if next < ObjectId::FIRST_USER.get() {
            return Err(Error::InvalidArgument(format!(
                "next object id must be at least {}, got {}",
                ObjectId::FIRST_USER,
                next
            )));
        }

        let data_log: Box<dyn Log> = self
            .data_log
            .take()
            .unwrap_or_else(|| Box::new(MemoryLog::new()));
        let version_index = match &self.recovered {
            Some(info) => {
                if data_log.tail() < info.data_tail {
                    return Err(Error::InvalidArgument(format!(
                        "data log ends at {} but the recovered data tail is {}",
                        data_log.tail(),
                        info.data_tail
                    )));
                }
                let entries = materialize_dict(
                    data_log.as_source(),
                    ObjectId::VERSION_INDEX,
                    info.version_index_ptr,
                )?;
                VersionIndex::from_committed(entries)
            }
            None => VersionIndex::new(),
        };
        next = next.max(version_index.compute_next_object_id()?.get());
        Ok(self.assemble(ObjectId::new(next), data_log, version_index))
    }

    fn assemble(
        self,
        next_object_id: ObjectId,
        data_log: Box<dyn Log>,
        version_index: VersionIndex,
    ) -> Workspace {
        let info = self.recovered.unwrap_or_else(RecoveryInfo::empty);
        let state = WorkspaceState {
            next_object_id,
            epoch_seq: info.epoch_seq,
            data_tail: info.data_tail,
            version_index_ptr: info.version_index_ptr,
            root_object_id: info.root_object_id,
            version_index,
        };
        Workspace {
            inner: Arc::new(WorkspaceInner {
                state: Mutex::new(state),
                identity: Mutex::new(IdentityMap::new()),
                dirty: Arc::new(Mutex::new(DirtySet::new())),
                data_log: Mutex::new(data_log),
                meta_log: self.meta_log.map(Mutex::new),
                loader: self.loader,
            }),
        }
    }
}
