//! Object engine for StateJournal
//!
//! This crate ties the storage formats to live objects:
//! - [`DurableDict`]: a dictionary with a committed map and a working overlay
//! - [`Workspace`]: id allocation, identity map, dirty set and two-phase commit
//! - [`LazyRef`]: a reference that resolves through a workspace on first use
//! - [`LogObjectLoader`]: materializes objects from a data log

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod object;
pub mod workspace;

pub use object::{
    DirtyNotifier, DurableDict, DurableObject, DurableObjectState, DurableType, ObjectCell,
    Shared, WeakObjectCell,
};
pub use workspace::{
    materialize_dict, CommitContext, DirtySet, IdentityMap, LazyRef, LogObjectLoader,
    ObjectLoader, VersionIndex, Workspace, WorkspaceBuilder, WrittenRecord,
};
