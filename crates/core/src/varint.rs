//! Variable-length integers
//!
//! Unsigned values use LEB128: seven data bits per byte, least significant
//! group first, high bit set on every byte except the last. A `u64` takes at
//! most 10 bytes and the 10th byte may only carry the single remaining bit.
//! Decoding rejects over-long (non-canonical) encodings so that every value has
//! exactly one byte representation.
//!
//! Signed values are ZigZag-mapped to unsigned first so small magnitudes of
//! either sign stay short.

use crate::error::{Error, Result};
use std::io::{self, Write};

/// Maximum encoded length of a `u64`
pub const MAX_VARUINT_BYTES: usize = 10;

/// Number of bytes `value` occupies as a varuint
pub const fn varuint_len(mut value: u64) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

/// Encode `value` into `buf`, returning the number of bytes used
pub fn encode_varuint(buf: &mut [u8; MAX_VARUINT_BYTES], mut value: u64) -> usize {
    let mut i = 0;
    while value >= 0x80 {
        buf[i] = (value as u8) | 0x80;
        value >>= 7;
        i += 1;
    }
    buf[i] = value as u8;
    i + 1
}

/// Write `value` as a varuint, returning the number of bytes written
pub fn write_varuint<W: Write + ?Sized>(out: &mut W, value: u64) -> io::Result<usize> {
    let mut buf = [0u8; MAX_VARUINT_BYTES];
    let len = encode_varuint(&mut buf, value);
    out.write_all(&buf[..len])?;
    Ok(len)
}

/// Decode a varuint from the front of `buf`
///
/// Returns `(value, bytes_consumed)`.
pub fn read_varuint(buf: &[u8]) -> Result<(u64, usize)> {
    if buf.is_empty() {
        return Err(Error::VarIntDecode(
            "unexpected EOF: empty buffer when reading varuint".to_string(),
        ));
    }

    let mut value: u64 = 0;
    let mut shift = 0u32;
    for (i, &byte) in buf.iter().enumerate() {
        let consumed = i + 1;
        if consumed > MAX_VARUINT_BYTES {
            return Err(Error::VarIntDecode(format!(
                "varuint overflow: more than {} bytes",
                MAX_VARUINT_BYTES
            )));
        }
        if consumed == MAX_VARUINT_BYTES && byte > 0x01 {
            return Err(Error::VarIntDecode(format!(
                "varuint overflow: 10th byte 0x{:02X} exceeds u64 range",
                byte
            )));
        }

        value |= u64::from(byte & 0x7F) << shift;
        shift += 7;

        if byte & 0x80 == 0 {
            let expected = varuint_len(value);
            if consumed != expected {
                return Err(Error::VarIntNonCanonical {
                    value,
                    actual: consumed,
                    expected,
                });
            }
            return Ok((value, consumed));
        }
    }

    Err(Error::VarIntDecode(format!(
        "unexpected EOF: continuation flag set at byte {} but no more data",
        buf.len()
    )))
}

/// Map a signed value onto the unsigned range, interleaving signs
#[inline]
pub const fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverse of [`zigzag_encode`]
#[inline]
pub const fn zigzag_decode(encoded: u64) -> i64 {
    ((encoded >> 1) as i64) ^ -((encoded & 1) as i64)
}

/// Write a signed value as ZigZag + varuint
pub fn write_varint<W: Write + ?Sized>(out: &mut W, value: i64) -> io::Result<usize> {
    write_varuint(out, zigzag_encode(value))
}

/// Decode a ZigZag varint from the front of `buf`
pub fn read_varint(buf: &[u8]) -> Result<(i64, usize)> {
    let (raw, consumed) = read_varuint(buf)?;
    Ok((zigzag_decode(raw), consumed))
}
