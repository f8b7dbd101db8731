//! Storage layer for StateJournal
//!
//! This crate owns every persisted byte layout and the logs they are written
//! to:
//! - DiffPayload codec (the per-object delta format)
//! - Frame layout with CRC32 and typed frame tags
//! - Object version and meta commit records
//! - `LogSink`/`LogSource` traits and the in-memory `MemoryLog`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod format;
pub mod log;

pub use format::{
    DiffPair, DiffPayloadReader, DiffPayloadWriter, FrameTag, MetaCommitRecord, ObjectKind,
    ObjectVersionRecord, RecordType,
};
pub use log::{Log, LogSink, LogSource, MemoryLog, SharedLog, LOG_HEADER_SIZE};
