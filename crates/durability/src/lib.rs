//! Durability layer for StateJournal
//!
//! This crate implements crash recovery over the meta and data logs:
//! - Meta log scanning up to the first torn frame
//! - Selection of the newest commit whose data is fully present
//! - Truncation of both logs back to that commit

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod recovery;

pub use recovery::{is_record_valid, recover, recover_logs, scan_meta_log, MetaScan, RecoveryInfo};
