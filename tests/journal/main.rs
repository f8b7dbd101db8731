//! Journal Integration Tests
//!
//! End-to-end behavior of the workspace over in-memory logs: commit cycles,
//! lazy references, identity map lifetimes and recovery.

mod common;

mod end_to_end;
mod lazy_ref;
mod recovery;
mod weak_vs_strong;
