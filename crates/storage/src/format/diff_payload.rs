//! DiffPayload: the binary delta of one durable dictionary
//!
//! ## Layout
//!
//! ```text
//! PairCount: varuint
//! (PairCount == 0: end)
//! FirstKey:  varuint
//! pair 0:    TagByte:u8  Value
//! pair i>0:  KeyDelta:varuint (>= 1)  TagByte:u8  Value
//! ```
//!
//! `TagByte` is `reserved(4 bits, = 0) | ValueType(4 bits)`. Values by type:
//!
//! | ValueType | Value bytes |
//! |-----------|-------------|
//! | Null, Tombstone | none |
//! | ObjRef | varuint ObjectId |
//! | VarInt | ZigZag varint |
//! | Ptr64 | u64 little-endian |
//!
//! Keys are strictly ascending and unique; after the first key each key is
//! stored as its distance from the previous one, which keeps dense key ranges
//! down to one byte per key.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use statejournal_core::value_type::validate_key_value_pair_type;
use statejournal_core::varint::{read_varint, read_varuint, write_varint, write_varuint};
use statejournal_core::{Error, ObjectId, Result, Value, ValueType};
use std::io::Write;

/// Size of a Ptr64 value
pub const PTR64_SIZE: usize = 8;

// ============================================================================
// Writer
// ============================================================================

/// Builds a diff payload into a byte sink
///
/// Pairs are buffered until [`complete`](Self::complete) because the pair
/// count heads the payload. `complete` may be called exactly once.
///
/// # Example
///
/// ```
/// use statejournal_storage::format::{DiffPayloadReader, DiffPayloadWriter};
///
/// let mut out = Vec::new();
/// let mut writer = DiffPayloadWriter::new(&mut out);
/// writer.write_var_int(10, -42).unwrap();
/// writer.write_tombstone(11).unwrap();
/// writer.complete().unwrap();
///
/// let mut reader = DiffPayloadReader::new(&out).unwrap();
/// assert_eq!(reader.pair_count(), 2);
/// let pair = reader.try_read_next().unwrap().unwrap();
/// assert_eq!(pair.key, 10);
/// ```
pub struct DiffPayloadWriter<'a, W: Write + ?Sized> {
    out: &'a mut W,
    /// Everything after FirstKey
    body: Vec<u8>,
    first_key: u64,
    last_key: Option<u64>,
    pair_count: usize,
    completed: bool,
}

impl<'a, W: Write + ?Sized> DiffPayloadWriter<'a, W> {
    /// Create a writer targeting `out`
    pub fn new(out: &'a mut W) -> Self {
        Self {
            out,
            body: Vec::new(),
            first_key: 0,
            last_key: None,
            pair_count: 0,
            completed: false,
        }
    }

    /// Pairs written so far
    pub fn pair_count(&self) -> usize {
        self.pair_count
    }

    /// Write an explicit null
    pub fn write_null(&mut self, key: u64) -> Result<()> {
        self.begin_pair(key, ValueType::Null)
    }

    /// Write a deletion marker
    pub fn write_tombstone(&mut self, key: u64) -> Result<()> {
        self.begin_pair(key, ValueType::Tombstone)
    }

    /// Write an object reference
    pub fn write_obj_ref(&mut self, key: u64, object_id: ObjectId) -> Result<()> {
        self.begin_pair(key, ValueType::ObjRef)?;
        write_varuint(&mut self.body, object_id.get())?;
        Ok(())
    }

    /// Write a signed integer
    pub fn write_var_int(&mut self, key: u64, value: i64) -> Result<()> {
        self.begin_pair(key, ValueType::VarInt)?;
        write_varint(&mut self.body, value)?;
        Ok(())
    }

    /// Write a raw 64-bit pointer
    pub fn write_ptr64(&mut self, key: u64, ptr: u64) -> Result<()> {
        self.begin_pair(key, ValueType::Ptr64)?;
        self.body.write_u64::<LittleEndian>(ptr)?;
        Ok(())
    }

    /// Write a dictionary value, choosing the tag by variant
    ///
    /// Fails with [`Error::UnsupportedValueType`] for variants the format
    /// cannot carry; nothing is written in that case.
    pub fn write_value(&mut self, key: u64, value: &Value) -> Result<()> {
        match value {
            Value::Null => self.write_null(key),
            Value::Int(v) => self.write_var_int(key, *v),
            Value::ObjRef(id) => self.write_obj_ref(key, *id),
            Value::Ptr64(p) => self.write_ptr64(key, *p),
            other => Err(Error::UnsupportedValueType {
                type_name: other.type_name(),
            }),
        }
    }

    /// Emit PairCount, FirstKey and the buffered pairs into the sink
    ///
    /// Returns the number of bytes written.
    pub fn complete(&mut self) -> Result<usize> {
        if self.completed {
            return Err(Error::InvalidOperation(
                "complete() has already been called".to_string(),
            ));
        }
        let mut header = Vec::with_capacity(20);
        write_varuint(&mut header, self.pair_count as u64)?;
        if self.pair_count > 0 {
            write_varuint(&mut header, self.first_key)?;
        }
        self.out.write_all(&header)?;
        if self.pair_count > 0 {
            self.out.write_all(&self.body)?;
        }
        self.completed = true;
        Ok(header.len() + self.body.len())
    }

    /// Check ordering, then append the key part and tag byte of a pair
    fn begin_pair(&mut self, key: u64, value_type: ValueType) -> Result<()> {
        if self.completed {
            return Err(Error::InvalidOperation(
                "cannot write pairs after complete()".to_string(),
            ));
        }
        match self.last_key {
            None => self.first_key = key,
            Some(last) if key <= last => {
                return Err(Error::InvalidArgument(format!(
                    "keys must be written in strictly ascending order: got key {} after {}",
                    key, last
                )));
            }
            Some(last) => {
                write_varuint(&mut self.body, key - last)?;
            }
        }
        self.body.push(value_type.tag_byte());
        self.last_key = Some(key);
        self.pair_count += 1;
        Ok(())
    }
}

// ============================================================================
// Reader
// ============================================================================

/// One decoded pair; `payload` borrows from the input buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffPair<'a> {
    /// Absolute key
    pub key: u64,
    /// Validated value type
    pub value_type: ValueType,
    /// Raw value bytes (empty for Null and Tombstone)
    pub payload: &'a [u8],
}

impl DiffPair<'_> {
    /// Decode the payload into a dictionary value
    ///
    /// Returns `None` for a tombstone.
    pub fn value(&self) -> Result<Option<Value>> {
        decode_value(self.value_type, self.payload)
    }
}

/// Streaming parser over a diff payload
///
/// Construction reads the pair count and fails on empty or truncated input.
/// The first failure of [`try_read_next`](Self::try_read_next) is terminal:
/// [`has_error`](Self::has_error) turns true and later calls keep failing.
#[derive(Debug)]
pub struct DiffPayloadReader<'a> {
    remaining: &'a [u8],
    pair_count: u64,
    pairs_read: u64,
    last_key: u64,
    error: Option<Error>,
}

impl<'a> DiffPayloadReader<'a> {
    /// Start reading `payload`
    pub fn new(payload: &'a [u8]) -> Result<Self> {
        let (pair_count, consumed) =
            read_varuint(payload).map_err(|e| eof_or(e, "reading PairCount"))?;
        Ok(Self {
            remaining: &payload[consumed..],
            pair_count,
            pairs_read: 0,
            last_key: 0,
            error: None,
        })
    }

    /// Declared number of pairs
    pub fn pair_count(&self) -> u64 {
        self.pair_count
    }

    /// Pairs successfully read so far
    pub fn pairs_read(&self) -> u64 {
        self.pairs_read
    }

    /// Whether a read has failed
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// The terminal failure, if any
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Read the next pair
    ///
    /// `Ok(None)` once all declared pairs have been read.
    pub fn try_read_next(&mut self) -> Result<Option<DiffPair<'a>>> {
        if let Some(err) = &self.error {
            return Err(replay(err));
        }
        if self.pairs_read >= self.pair_count {
            return Ok(None);
        }
        match self.read_pair() {
            Ok(pair) => {
                self.pairs_read += 1;
                Ok(Some(pair))
            }
            Err(err) => {
                let returned = replay(&err);
                self.error = Some(err);
                Err(returned)
            }
        }
    }

    fn read_pair(&mut self) -> Result<DiffPair<'a>> {
        let key = if self.pairs_read == 0 {
            self.take_varuint("reading FirstKey")?
        } else {
            let delta = self.take_varuint("reading KeyDelta")?;
            if delta == 0 {
                return Err(Error::DiffKeySorting {
                    previous: self.last_key,
                    current: self.last_key,
                });
            }
            self.last_key
                .checked_add(delta)
                .ok_or_else(|| Error::DiffPayloadFormat {
                    message: format!("key overflow: {} + {} exceeds u64", self.last_key, delta),
                })?
        };

        let (&tag, rest) = self
            .remaining
            .split_first()
            .ok_or_else(|| Error::eof("reading TagByte"))?;
        self.remaining = rest;
        let value_type = validate_key_value_pair_type(tag)?;

        let payload = self.take_payload(value_type)?;
        self.last_key = key;
        Ok(DiffPair {
            key,
            value_type,
            payload,
        })
    }

    fn take_varuint(&mut self, context: &str) -> Result<u64> {
        let (value, consumed) = read_varuint(self.remaining).map_err(|e| eof_or(e, context))?;
        self.remaining = &self.remaining[consumed..];
        Ok(value)
    }

    fn take_payload(&mut self, value_type: ValueType) -> Result<&'a [u8]> {
        let len = match value_type {
            ValueType::Null | ValueType::Tombstone => 0,
            ValueType::ObjRef | ValueType::VarInt => {
                read_varuint(self.remaining)
                    .map_err(|e| eof_or(e, &format!("reading {} payload", value_type)))?
                    .1
            }
            ValueType::Ptr64 => {
                if self.remaining.len() < PTR64_SIZE {
                    return Err(Error::eof("reading Ptr64 payload (need 8 bytes)"));
                }
                PTR64_SIZE
            }
        };
        let (payload, rest) = self.remaining.split_at(len);
        self.remaining = rest;
        Ok(payload)
    }

    // ------------------------------------------------------------------
    // Payload decoders
    // ------------------------------------------------------------------

    /// Decode an ObjRef payload
    pub fn read_obj_ref(payload: &[u8]) -> Result<ObjectId> {
        let (raw, _) = read_varuint(payload).map_err(|e| eof_or(e, "reading ObjRef payload"))?;
        Ok(ObjectId::new(raw))
    }

    /// Decode a VarInt payload
    pub fn read_var_int(payload: &[u8]) -> Result<i64> {
        let (value, _) = read_varint(payload).map_err(|e| eof_or(e, "reading VarInt payload"))?;
        Ok(value)
    }

    /// Decode a Ptr64 payload
    pub fn read_ptr64(payload: &[u8]) -> Result<u64> {
        if payload.len() < PTR64_SIZE {
            return Err(Error::eof("Ptr64 payload must be 8 bytes"));
        }
        Ok(LittleEndian::read_u64(payload))
    }
}

/// Decode the payload of a pair into a value; `None` for Tombstone
pub fn decode_value(value_type: ValueType, payload: &[u8]) -> Result<Option<Value>> {
    Ok(match value_type {
        ValueType::Null => Some(Value::Null),
        ValueType::Tombstone => None,
        ValueType::ObjRef => Some(Value::ObjRef(DiffPayloadReader::read_obj_ref(payload)?)),
        ValueType::VarInt => Some(Value::Int(DiffPayloadReader::read_var_int(payload)?)),
        ValueType::Ptr64 => Some(Value::Ptr64(DiffPayloadReader::read_ptr64(payload)?)),
    })
}

/// Truncated varints become payload EOF errors; other varint errors pass through
fn eof_or(err: Error, context: &str) -> Error {
    match err {
        Error::VarIntDecode(_) => Error::eof(context),
        other => other,
    }
}

/// Reproduce a stored reader failure for repeat callers
fn replay(err: &Error) -> Error {
    match err {
        Error::DiffPayloadFormat { message } => Error::DiffPayloadFormat {
            message: message.clone(),
        },
        Error::UnknownValueType { tag } => Error::UnknownValueType { tag: *tag },
        Error::DiffKeySorting { previous, current } => Error::DiffKeySorting {
            previous: *previous,
            current: *current,
        },
        Error::DiffPayloadEof { context } => Error::eof(context.clone()),
        Error::VarIntNonCanonical {
            value,
            actual,
            expected,
        } => Error::VarIntNonCanonical {
            value: *value,
            actual: *actual,
            expected: *expected,
        },
        other => Error::Internal(format!("diff payload reader failed: {}", other)),
    }
}
