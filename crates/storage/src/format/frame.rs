//! Log frame format
//!
//! Every record in the journal log is wrapped in a frame:
//!
//! ```text
//! +----------+----------+-------------------+----------+
//! | tag: u32 | len: u32 | payload: len bytes| crc: u32 |
//! +----------+----------+-------------------+----------+
//! ```
//!
//! All integers are little-endian. The CRC32 covers tag, length and payload.
//!
//! # Frame Tags
//!
//! The low 16 bits of a tag name the [`RecordType`]; the high 16 bits carry a
//! subtype. For object-version records the subtype is the [`ObjectKind`]. For
//! every other record type the subtype must be zero.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use statejournal_core::{Error, Result};
use std::io::Write;

/// Bytes of header (tag + len) preceding the payload
pub const FRAME_HEADER_SIZE: usize = 8;

/// Bytes of trailing checksum
pub const FRAME_CRC_SIZE: usize = 4;

/// Total framing overhead per record
pub const FRAME_OVERHEAD: usize = FRAME_HEADER_SIZE + FRAME_CRC_SIZE;

/// Kind of record carried in a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum RecordType {
    /// One object's version: prev pointer plus diff payload
    ObjectVersion = 0x0001,
    /// Commit point: epoch, root and watermarks
    MetaCommit = 0x0002,
}

impl RecordType {
    fn from_u16(raw: u16) -> Option<Self> {
        match raw {
            0x0001 => Some(RecordType::ObjectVersion),
            0x0002 => Some(RecordType::MetaCommit),
            _ => None,
        }
    }
}

/// Kind of durable object an object-version record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ObjectKind {
    /// Durable dictionary
    Dict = 0x0001,
}

impl ObjectKind {
    fn from_u16(raw: u16) -> Option<Self> {
        match raw {
            0x0001 => Some(ObjectKind::Dict),
            _ => None,
        }
    }
}

/// 32-bit frame tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameTag(u32);

impl FrameTag {
    /// Dictionary version record
    pub const DICT_VERSION: FrameTag = FrameTag::object_version(ObjectKind::Dict);

    /// Meta commit record
    pub const META_COMMIT: FrameTag = FrameTag::new(RecordType::MetaCommit, 0);

    /// Compose a tag from its halves
    pub const fn new(record_type: RecordType, sub_type: u16) -> Self {
        FrameTag(((sub_type as u32) << 16) | record_type as u32)
    }

    /// Tag of an object-version record for `kind`
    pub const fn object_version(kind: ObjectKind) -> Self {
        FrameTag::new(RecordType::ObjectVersion, kind as u16)
    }

    /// Raw value as written to the log
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Validate a raw tag read from the log
    pub fn parse(raw: u32) -> Result<Self> {
        let record_raw = (raw & 0xFFFF) as u16;
        let sub_type = (raw >> 16) as u16;
        let record_type = RecordType::from_u16(record_raw).ok_or_else(|| Error::UnknownFrameTag {
            tag: raw,
            reason: format!("unknown record type 0x{:04X}", record_raw),
        })?;
        match record_type {
            RecordType::ObjectVersion => {
                if ObjectKind::from_u16(sub_type).is_none() {
                    return Err(Error::UnknownFrameTag {
                        tag: raw,
                        reason: format!("unknown object kind 0x{:04X}", sub_type),
                    });
                }
            }
            RecordType::MetaCommit => {
                if sub_type != 0 {
                    return Err(Error::UnknownFrameTag {
                        tag: raw,
                        reason: "meta commit subtype must be zero".to_string(),
                    });
                }
            }
        }
        Ok(FrameTag(raw))
    }

    /// Record type half
    pub fn record_type(self) -> RecordType {
        // Only constructed through `new` or a validated `parse`
        RecordType::from_u16((self.0 & 0xFFFF) as u16).unwrap_or(RecordType::ObjectVersion)
    }

    /// Object kind, for object-version tags
    pub fn object_kind(self) -> Option<ObjectKind> {
        match self.record_type() {
            RecordType::ObjectVersion => ObjectKind::from_u16((self.0 >> 16) as u16),
            RecordType::MetaCommit => None,
        }
    }
}

impl std::fmt::Display for FrameTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

fn checksum(tag: u32, payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    let mut header = [0u8; FRAME_HEADER_SIZE];
    LittleEndian::write_u32(&mut header[..4], tag);
    LittleEndian::write_u32(&mut header[4..], payload.len() as u32);
    hasher.update(&header);
    hasher.update(payload);
    hasher.finalize()
}

/// Write one frame, returning the bytes written
pub fn write_frame<W: Write + ?Sized>(out: &mut W, tag: FrameTag, payload: &[u8]) -> Result<usize> {
    let len = u32::try_from(payload.len()).map_err(|_| {
        Error::InvalidArgument(format!(
            "frame payload of {} bytes exceeds u32 length field",
            payload.len()
        ))
    })?;
    out.write_u32::<LittleEndian>(tag.get())?;
    out.write_u32::<LittleEndian>(len)?;
    out.write_all(payload)?;
    out.write_u32::<LittleEndian>(checksum(tag.get(), payload))?;
    Ok(FRAME_OVERHEAD + payload.len())
}

/// A decoded frame borrowing its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    /// Validated tag
    pub tag: FrameTag,
    /// Record bytes
    pub payload: &'a [u8],
}

impl Frame<'_> {
    /// Bytes this frame occupies in the log
    pub fn encoded_len(&self) -> usize {
        FRAME_OVERHEAD + self.payload.len()
    }
}

/// Decode the frame at the start of `bytes`
///
/// `position` is only used for error messages.
pub fn read_frame(bytes: &[u8], position: u64) -> Result<Frame<'_>> {
    if bytes.len() < FRAME_HEADER_SIZE {
        return Err(Error::FrameCorrupt {
            position,
            reason: format!("header needs {} bytes, {} available", FRAME_HEADER_SIZE, bytes.len()),
        });
    }
    let raw_tag = LittleEndian::read_u32(&bytes[..4]);
    let len = LittleEndian::read_u32(&bytes[4..8]) as usize;
    let end = FRAME_HEADER_SIZE + len;
    if bytes.len() < end + FRAME_CRC_SIZE {
        return Err(Error::FrameCorrupt {
            position,
            reason: format!("declared length {} runs past end of log", len),
        });
    }
    let payload = &bytes[FRAME_HEADER_SIZE..end];
    let stored = LittleEndian::read_u32(&bytes[end..end + FRAME_CRC_SIZE]);
    let computed = checksum(raw_tag, payload);
    if stored != computed {
        return Err(Error::FrameCorrupt {
            position,
            reason: format!("crc mismatch: stored 0x{:08X}, computed 0x{:08X}", stored, computed),
        });
    }
    Ok(Frame {
        tag: FrameTag::parse(raw_tag)?,
        payload,
    })
}
