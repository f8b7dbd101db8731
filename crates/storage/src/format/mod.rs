//! Byte formats of the journal
//!
//! This module centralizes all serialization logic for persisted bytes.
//! Keeping layouts separate from operational logic (how logs are written and
//! objects materialized) makes format evolution easier to manage.
//!
//! # Module Structure
//!
//! - `diff_payload`: per-object key/value delta codec
//! - `frame`: frame layout, frame tags and checksums
//! - `object_version`: object version record (prev pointer + diff)
//! - `meta_record`: meta commit record

pub mod diff_payload;
pub mod frame;
pub mod meta_record;
pub mod object_version;

pub use diff_payload::{decode_value, DiffPair, DiffPayloadReader, DiffPayloadWriter};
pub use frame::{
    read_frame, write_frame, Frame, FrameTag, ObjectKind, RecordType, FRAME_OVERHEAD,
};
pub use meta_record::MetaCommitRecord;
pub use object_version::{ObjectVersionRecord, NO_PREVIOUS_VERSION};
