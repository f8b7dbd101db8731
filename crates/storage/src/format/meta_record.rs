//! Meta commit record
//!
//! The last frame of every commit. Recovery locates the newest meta record
//! whose `data_tail` fits inside the log and restores the workspace from it.
//!
//! ```text
//! EpochSeq:         varuint
//! RootObjectId:     varuint
//! VersionIndexPtr:  u64 LE
//! DataTail:         u64 LE
//! NextObjectId:     varuint
//! ```

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use serde::{Deserialize, Serialize};
use statejournal_core::varint::{read_varuint, write_varuint};
use statejournal_core::{Error, ObjectId, Result};
use std::io::Write;

const RECORD: &str = "MetaCommitRecord";

/// Commit point of one epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaCommitRecord {
    /// Epoch this record closes
    pub epoch_seq: u64,
    /// Root object of the workspace (stored as 0 when unset)
    pub root_object_id: Option<ObjectId>,
    /// Log position of the version index written by this commit
    pub version_index_ptr: u64,
    /// Log length after the data written by this commit
    pub data_tail: u64,
    /// Next id the allocator will hand out
    pub next_object_id: ObjectId,
}

impl MetaCommitRecord {
    /// Serialize the record body
    pub fn write_to<W: Write + ?Sized>(&self, out: &mut W) -> Result<usize> {
        let mut n = write_varuint(out, self.epoch_seq)?;
        n += write_varuint(out, self.root_object_id.map_or(0, ObjectId::get))?;
        out.write_u64::<LittleEndian>(self.version_index_ptr)?;
        out.write_u64::<LittleEndian>(self.data_tail)?;
        n += 16;
        n += write_varuint(out, self.next_object_id.get())?;
        Ok(n)
    }

    /// Encode into a fresh buffer
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(32);
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    /// Parse a record body
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let mut cursor = payload;
        let epoch_seq = take_varuint(&mut cursor, "EpochSeq")?;
        let root_raw = take_varuint(&mut cursor, "RootObjectId")?;
        let root_object_id = (root_raw != 0).then(|| ObjectId::new(root_raw));
        let version_index_ptr = take_u64(&mut cursor, "VersionIndexPtr")?;
        let data_tail = take_u64(&mut cursor, "DataTail")?;
        let next_object_id = ObjectId::new(take_varuint(&mut cursor, "NextObjectId")?);
        Ok(Self {
            epoch_seq,
            root_object_id,
            version_index_ptr,
            data_tail,
            next_object_id,
        })
    }
}

fn take_varuint(cursor: &mut &[u8], field: &'static str) -> Result<u64> {
    let bytes: &[u8] = *cursor;
    let (value, consumed) = read_varuint(bytes).map_err(|e| match e {
        Error::VarIntDecode(_) => Error::RecordTruncated { record: RECORD, field },
        other => other,
    })?;
    *cursor = &bytes[consumed..];
    Ok(value)
}

fn take_u64(cursor: &mut &[u8], field: &'static str) -> Result<u64> {
    let bytes: &[u8] = *cursor;
    if bytes.len() < 8 {
        return Err(Error::RecordTruncated { record: RECORD, field });
    }
    let value = LittleEndian::read_u64(&bytes[..8]);
    *cursor = &bytes[8..];
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MetaCommitRecord {
        MetaCommitRecord {
            epoch_seq: 3,
            root_object_id: Some(ObjectId::new(16)),
            version_index_ptr: 0x200,
            data_tail: 0x240,
            next_object_id: ObjectId::new(20),
        }
    }

    #[test]
    fn test_roundtrip() {
        let record = sample();
        let bytes = record.encode().unwrap();
        assert_eq!(bytes.len(), 1 + 1 + 8 + 8 + 1);
        assert_eq!(MetaCommitRecord::parse(&bytes).unwrap(), record);
    }

    #[test]
    fn test_unset_root_is_zero() {
        let record = MetaCommitRecord {
            root_object_id: None,
            ..sample()
        };
        let bytes = record.encode().unwrap();
        assert_eq!(bytes[1], 0x00);
        assert_eq!(MetaCommitRecord::parse(&bytes).unwrap().root_object_id, None);
    }

    #[test]
    fn test_truncation_names_field() {
        let bytes = sample().encode().unwrap();
        let err = MetaCommitRecord::parse(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(err.to_string().contains("NextObjectId"));

        let err = MetaCommitRecord::parse(&bytes[..5]).unwrap_err();
        assert!(err.to_string().contains("VersionIndexPtr"));

        let err = MetaCommitRecord::parse(&[]).unwrap_err();
        assert!(err.to_string().contains("EpochSeq"));
    }
}
