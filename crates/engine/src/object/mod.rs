//! Durable objects
//!
//! A durable object keeps a committed baseline and a working overlay of
//! uncommitted edits. Its [`DurableObjectState`] moves through:
//!
//! ```text
//!   create ──► TransientDirty ──discard──► Detached (terminal)
//!                   │
//!                 commit
//!                   ▼
//!   load ────►    Clean ◄──commit / discard── PersistentDirty
//!                   │                               ▲
//!                   └──────── first mutation ───────┘
//! ```
//!
//! Workspaces hold objects type-erased as [`ObjectCell`] (strong) and
//! [`WeakObjectCell`] (weak); applications hold them typed as [`Shared<T>`].

pub mod dict;

pub use dict::DurableDict;

use crate::workspace::dirty_set::DirtySet;
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use statejournal_core::{Error, ObjectId, Result};
use statejournal_storage::ObjectKind;
use std::any::Any;
use std::fmt;
use std::io::Write;
use std::sync::{Arc, Weak};

/// Typed shared handle to a durable object
pub type Shared<T> = Arc<RwLock<T>>;

/// Lifecycle state of a durable object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DurableObjectState {
    /// Matches its committed baseline
    Clean,
    /// Committed before, has uncommitted edits
    PersistentDirty,
    /// Never committed
    TransientDirty,
    /// Discarded before its first commit; every accessor fails
    Detached,
}

impl DurableObjectState {
    /// True for the two dirty states
    pub fn is_dirty(self) -> bool {
        matches!(
            self,
            DurableObjectState::PersistentDirty | DurableObjectState::TransientDirty
        )
    }
}

impl fmt::Display for DurableObjectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DurableObjectState::Clean => "Clean",
            DurableObjectState::PersistentDirty => "PersistentDirty",
            DurableObjectState::TransientDirty => "TransientDirty",
            DurableObjectState::Detached => "Detached",
        };
        f.write_str(name)
    }
}

/// Behaviour shared by every durable object
///
/// Every method except [`state`](Self::state), [`object_id`](Self::object_id)
/// and [`discard_changes`](Self::discard_changes) fails with
/// [`Error::ObjectDetached`] once the object is detached.
pub trait DurableObject: Any + Send + Sync {
    /// Identity within the owning workspace
    fn object_id(&self) -> ObjectId;

    /// Current lifecycle state (always readable)
    fn state(&self) -> DurableObjectState;

    /// Short type name used in mismatch errors
    fn type_name(&self) -> &'static str;

    /// Kind written into the frame tag of this object's versions
    fn object_kind(&self) -> ObjectKind;

    /// Whether the working overlay holds edits
    fn has_changes(&self) -> Result<bool>;

    /// Serialize the working overlay as a diff payload
    ///
    /// Does not change the object; may be called any number of times.
    fn write_pending_diff(&self, out: &mut dyn Write) -> Result<()>;

    /// Fold the working overlay into the baseline after a durable write
    fn on_commit_succeeded(&mut self) -> Result<()>;

    /// Fold `diff`, a payload this object wrote earlier, into the baseline
    ///
    /// Edits made after `diff` was written stay in the overlay, rebased on
    /// the new baseline; the object is Clean only if none remain.
    fn on_diff_committed(&mut self, diff: &[u8]) -> Result<()>;

    /// Drop the working overlay
    ///
    /// PersistentDirty returns to Clean, TransientDirty becomes Detached,
    /// Clean and Detached are left as they are.
    fn discard_changes(&mut self);

    /// Register the hook fired on the first transition into a dirty state
    fn attach_notifier(&mut self, notifier: DirtyNotifier);

    /// Upcast for downcasting
    fn as_any(&self) -> &dyn Any;
}

/// A concrete durable object type a workspace can create and load
pub trait DurableType: DurableObject + Sized {
    /// Name reported in type-mismatch errors
    const TYPE_NAME: &'static str;

    /// A fresh, never-committed instance
    fn new_transient(object_id: ObjectId) -> Self;
}

// ============================================================================
// Type-erased handles
// ============================================================================

/// Strong, type-erased reference to a durable object
#[derive(Clone)]
pub struct ObjectCell {
    object_id: ObjectId,
    type_name: &'static str,
    erased: Arc<RwLock<dyn DurableObject>>,
    typed: Arc<dyn Any + Send + Sync>,
}

impl ObjectCell {
    /// Wrap a new object
    pub fn new<T: DurableType>(object: T) -> Self {
        Self::from_shared(Arc::new(RwLock::new(object)))
    }

    /// Wrap an existing typed handle
    pub fn from_shared<T: DurableType>(shared: Shared<T>) -> Self {
        let object_id = shared.read().object_id();
        let erased: Arc<RwLock<dyn DurableObject>> = shared.clone();
        let typed: Arc<dyn Any + Send + Sync> = shared;
        Self {
            object_id,
            type_name: T::TYPE_NAME,
            erased,
            typed,
        }
    }

    /// Id of the wrapped object
    pub fn object_id(&self) -> ObjectId {
        self.object_id
    }

    /// Type name of the wrapped object
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Lock for reading
    pub fn read(&self) -> RwLockReadGuard<'_, dyn DurableObject> {
        self.erased.read()
    }

    /// Lock for writing
    pub fn write(&self) -> RwLockWriteGuard<'_, dyn DurableObject> {
        self.erased.write()
    }

    /// Recover the typed handle, failing with a type mismatch
    pub fn downcast<T: DurableType>(&self) -> Result<Shared<T>> {
        Arc::clone(&self.typed)
            .downcast::<RwLock<T>>()
            .map_err(|_| Error::ObjectTypeMismatch {
                object_id: self.object_id,
                expected: T::TYPE_NAME,
                actual: self.type_name,
            })
    }

    /// Weak counterpart
    pub fn downgrade(&self) -> WeakObjectCell {
        WeakObjectCell {
            object_id: self.object_id,
            type_name: self.type_name,
            erased: Arc::downgrade(&self.erased),
            typed: Arc::downgrade(&self.typed),
        }
    }

    /// True if both cells wrap the same instance
    pub fn ptr_eq(&self, other: &ObjectCell) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.typed) as *const (),
            Arc::as_ptr(&other.typed) as *const (),
        )
    }
}

impl fmt::Debug for ObjectCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectCell")
            .field("object_id", &self.object_id)
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// Weak, type-erased reference to a durable object
#[derive(Clone)]
pub struct WeakObjectCell {
    object_id: ObjectId,
    type_name: &'static str,
    erased: Weak<RwLock<dyn DurableObject>>,
    typed: Weak<dyn Any + Send + Sync>,
}

impl WeakObjectCell {
    /// Id of the referenced object
    pub fn object_id(&self) -> ObjectId {
        self.object_id
    }

    /// Strong reference, if the object is still alive
    pub fn upgrade(&self) -> Option<ObjectCell> {
        Some(ObjectCell {
            object_id: self.object_id,
            type_name: self.type_name,
            erased: self.erased.upgrade()?,
            typed: self.typed.upgrade()?,
        })
    }

    /// True if the object has been dropped
    pub fn is_dead(&self) -> bool {
        self.typed.strong_count() == 0
    }
}

impl fmt::Debug for WeakObjectCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakObjectCell")
            .field("object_id", &self.object_id)
            .field("alive", &!self.is_dead())
            .finish()
    }
}

// ============================================================================
// Dirty notification
// ============================================================================

/// Puts an object back into its workspace's dirty set
///
/// Attached by the workspace on create and load. Fired by the object when it
/// leaves Clean, so a loaded object that gets modified is picked up by the
/// next commit.
#[derive(Clone)]
pub struct DirtyNotifier {
    dirty: Weak<Mutex<DirtySet>>,
    cell: WeakObjectCell,
}

impl DirtyNotifier {
    pub(crate) fn new(dirty: &Arc<Mutex<DirtySet>>, cell: &ObjectCell) -> Self {
        Self {
            dirty: Arc::downgrade(dirty),
            cell: cell.downgrade(),
        }
    }

    /// Register the object as dirty; no-op if the workspace is gone
    pub fn notify(&self) {
        let (Some(dirty), Some(cell)) = (self.dirty.upgrade(), self.cell.upgrade()) else {
            return;
        };
        dirty.lock().add(cell);
    }
}

impl fmt::Debug for DirtyNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirtyNotifier")
            .field("object_id", &self.cell.object_id())
            .finish()
    }
}
