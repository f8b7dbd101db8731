//! Deferred object references
//!
//! A [`LazyRef`] is one of:
//!
//! - **Uninitialized** (`LazyRef::default()`): every accessor fails with
//!   [`Error::LazyRefNotInitialized`]
//! - **IdOnly** (`LazyRef::new(id, &workspace)`): resolved on first access
//!   through [`Workspace::load_object`], then cached
//! - **Materialized** (`LazyRef::from_instance`): holds the object directly
//!
//! Resolution goes through the workspace's identity map, so two references
//! to the same id in the same workspace converge on one instance.

use super::Workspace;
use crate::object::{DurableType, Shared};
use once_cell::sync::OnceCell;
use statejournal_core::{Error, ObjectId, Result};
use std::fmt;

enum Target {
    Uninitialized,
    IdOnly {
        object_id: ObjectId,
        workspace: Workspace,
    },
    Instance {
        object_id: ObjectId,
    },
}

/// Reference to a durable object that loads on first use
pub struct LazyRef<T: DurableType> {
    target: Target,
    cache: OnceCell<Shared<T>>,
}

impl<T: DurableType> LazyRef<T> {
    /// Reference `object_id`, resolving it through `workspace` when first used
    pub fn new(object_id: ObjectId, workspace: &Workspace) -> Self {
        Self {
            target: Target::IdOnly {
                object_id,
                workspace: workspace.clone(),
            },
            cache: OnceCell::new(),
        }
    }

    /// Reference an object already in hand
    pub fn from_instance(instance: Shared<T>) -> Self {
        let object_id = instance.read().object_id();
        Self {
            target: Target::Instance { object_id },
            cache: OnceCell::with_value(instance),
        }
    }

    /// False for a default-constructed reference
    pub fn is_initialized(&self) -> bool {
        !matches!(self.target, Target::Uninitialized)
    }

    /// Whether the target has been resolved
    pub fn is_loaded(&self) -> bool {
        self.cache.get().is_some()
    }

    /// Id of the referenced object
    pub fn object_id(&self) -> Result<ObjectId> {
        match &self.target {
            Target::Uninitialized => Err(Error::LazyRefNotInitialized),
            Target::IdOnly { object_id, .. } | Target::Instance { object_id } => Ok(*object_id),
        }
    }

    /// Resolve, returning the underlying failure unchanged
    pub fn try_get_value(&self) -> Result<Shared<T>> {
        let cached = match &self.target {
            Target::Uninitialized => return Err(Error::LazyRefNotInitialized),
            Target::Instance { .. } => self.cache.get_or_try_init(|| {
                Err(Error::Internal("instance reference lost its cache".to_string()))
            })?,
            Target::IdOnly {
                object_id,
                workspace,
            } => self
                .cache
                .get_or_try_init(|| workspace.load_object::<T>(*object_id))?,
        };
        Ok(cached.clone())
    }

    /// Resolve, wrapping load failures in [`Error::LazyLoad`] with the id
    pub fn value(&self) -> Result<Shared<T>> {
        self.try_get_value().map_err(|err| match (err, &self.target) {
            (Error::LazyRefNotInitialized, _) => Error::LazyRefNotInitialized,
            (source, Target::IdOnly { object_id, .. } | Target::Instance { object_id }) => {
                Error::LazyLoad {
                    object_id: *object_id,
                    source: Box::new(source),
                }
            }
            (source, Target::Uninitialized) => source,
        })
    }
}

impl<T: DurableType> Default for LazyRef<T> {
    fn default() -> Self {
        Self {
            target: Target::Uninitialized,
            cache: OnceCell::new(),
        }
    }
}

impl<T: DurableType> Clone for LazyRef<T> {
    fn clone(&self) -> Self {
        let target = match &self.target {
            Target::Uninitialized => Target::Uninitialized,
            Target::IdOnly {
                object_id,
                workspace,
            } => Target::IdOnly {
                object_id: *object_id,
                workspace: workspace.clone(),
            },
            Target::Instance { object_id } => Target::Instance {
                object_id: *object_id,
            },
        };
        let cache = match self.cache.get() {
            Some(instance) => OnceCell::with_value(instance.clone()),
            None => OnceCell::new(),
        };
        Self { target, cache }
    }
}

impl<T: DurableType> fmt::Debug for LazyRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("LazyRef");
        match &self.target {
            Target::Uninitialized => s.field("target", &"uninitialized"),
            Target::IdOnly { object_id, .. } | Target::Instance { object_id } => {
                s.field("object_id", object_id)
            }
        };
        s.field("loaded", &self.is_loaded()).finish()
    }
}
