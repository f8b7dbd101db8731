//! Convenient imports for StateJournal.
//!
//! ```
//! use statejournal::prelude::*;
//!
//! let ws = Workspace::new();
//! let dict = ws.create_object::<DurableDict>().unwrap();
//! dict.write().set(1, 2).unwrap();
//! ```

// Main entry point
pub use statejournal_engine::{Workspace, WorkspaceBuilder};

// Error handling
pub use statejournal_core::{Error, Result};

// Objects
pub use statejournal_engine::{DurableDict, DurableObject, DurableObjectState, LazyRef, Shared};

// Core types
pub use statejournal_core::{ObjectId, Value};

// Logs
pub use statejournal_storage::{Log, LogSink, LogSource, MemoryLog, SharedLog};
