//! # StateJournal
//!
//! Embedded object-persistence core: durable collections that record their
//! changes as binary diffs and commit them in two phases.
//!
//! ## Quick Start
//!
//! ```
//! use statejournal::prelude::*;
//!
//! let data = MemoryLog::shared();
//! let meta = MemoryLog::shared();
//! let ws = Workspace::builder()
//!     .log(data.clone())
//!     .meta_log(meta.clone())
//!     .build()?;
//!
//! let dict = ws.create_object::<DurableDict>()?;
//! dict.write().set(10, 100)?;
//! ws.commit()?;
//!
//! // Reopen from the logs
//! let reopened = Workspace::open_logs(data, meta)?;
//! let again = reopened.load_object::<DurableDict>(ObjectId::new(16))?;
//! assert_eq!(again.read().get(10)?, Some(&Value::Int(100)));
//! # Ok::<(), statejournal::Error>(())
//! ```
//!
//! ## Crates
//!
//! - [`core`]: ids, values, varints and the error type
//! - [`storage`]: DiffPayload codec, frames, records and logs
//! - [`durability`]: meta log recovery
//! - [`engine`]: durable objects and the workspace

#![warn(missing_docs)]

pub mod prelude;

pub use statejournal_core as core;
pub use statejournal_durability as durability;
pub use statejournal_engine as engine;
pub use statejournal_storage as storage;

// Re-export main entry points
pub use statejournal_core::{Error, ObjectId, Result, Value, ValueType};
pub use statejournal_durability::RecoveryInfo;
pub use statejournal_engine::{
    CommitContext, DurableDict, DurableObject, DurableObjectState, LazyRef, Workspace,
    WorkspaceBuilder,
};
pub use statejournal_storage::{DiffPayloadReader, DiffPayloadWriter, MemoryLog};
