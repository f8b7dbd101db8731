//! Object version record
//!
//! ```text
//! PrevVersionPtr: u64 LE   (0 = first version of the object)
//! DiffPayload:    rest of the frame
//! ```
//!
//! Versions of one object form a backward chain through `PrevVersionPtr`.
//! Materialization walks the chain to its start, then applies the diffs
//! oldest first.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use statejournal_core::{Error, Result};
use std::io::Write;

/// Size of the PrevVersionPtr field
pub const PREV_PTR_SIZE: usize = 8;

/// Sentinel for "no previous version"
pub const NO_PREVIOUS_VERSION: u64 = 0;

/// Parsed object version record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectVersionRecord<'a> {
    /// Log position of the previous version, 0 if none
    pub prev_version_ptr: u64,
    /// Diff relative to the previous version
    pub diff_payload: &'a [u8],
}

impl<'a> ObjectVersionRecord<'a> {
    /// Serialize a record body
    pub fn write_to<W: Write + ?Sized>(out: &mut W, prev_version_ptr: u64, diff_payload: &[u8]) -> Result<usize> {
        out.write_u64::<LittleEndian>(prev_version_ptr)?;
        out.write_all(diff_payload)?;
        Ok(PREV_PTR_SIZE + diff_payload.len())
    }

    /// Encode a record body into a fresh buffer
    pub fn encode(prev_version_ptr: u64, diff_payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(PREV_PTR_SIZE + diff_payload.len());
        buf.extend_from_slice(&prev_version_ptr.to_le_bytes());
        buf.extend_from_slice(diff_payload);
        buf
    }

    /// Parse a record body
    pub fn parse(payload: &'a [u8]) -> Result<Self> {
        if payload.len() < PREV_PTR_SIZE {
            return Err(Error::RecordTruncated {
                record: "ObjectVersionRecord",
                field: "PrevVersionPtr",
            });
        }
        Ok(Self {
            prev_version_ptr: LittleEndian::read_u64(&payload[..PREV_PTR_SIZE]),
            diff_payload: &payload[PREV_PTR_SIZE..],
        })
    }

    /// True if this is the first version of its object
    pub fn is_first_version(&self) -> bool {
        self.prev_version_ptr == NO_PREVIOUS_VERSION
    }
}
