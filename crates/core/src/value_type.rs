//! Value type tags of the diff payload format
//!
//! Each key/value pair in a diff payload carries one tag byte:
//!
//! ```text
//!   7   6   5   4   3   2   1   0
//! +---------------+---------------+
//! | reserved (=0) |   ValueType   |
//! +---------------+---------------+
//! ```
//!
//! Readers reject a non-zero reserved nibble and any value type above
//! [`ValueType::MAX_KNOWN`], so bytes written by a newer format revision are
//! never silently misread.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Mask of the reserved high nibble
pub const HIGH_BITS_MASK: u8 = 0xF0;

/// Mask of the value type nibble
pub const LOW_BITS_MASK: u8 = 0x0F;

/// Value type of a diff payload pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ValueType {
    /// Explicit null, no payload
    Null = 0x0,
    /// Key deleted, no payload
    Tombstone = 0x1,
    /// Object reference, payload is a varuint ObjectId
    ObjRef = 0x2,
    /// Signed integer, payload is a ZigZag varint
    VarInt = 0x3,
    /// 64-bit pointer, payload is 8 little-endian bytes
    Ptr64 = 0x4,
}

impl ValueType {
    /// Largest value type nibble this revision understands
    pub const MAX_KNOWN: u8 = 0x4;

    /// Map a nibble to a value type, `None` if unknown
    pub const fn from_nibble(nibble: u8) -> Option<Self> {
        match nibble {
            0x0 => Some(ValueType::Null),
            0x1 => Some(ValueType::Tombstone),
            0x2 => Some(ValueType::ObjRef),
            0x3 => Some(ValueType::VarInt),
            0x4 => Some(ValueType::Ptr64),
            _ => None,
        }
    }

    /// Tag byte for this type (reserved bits zero)
    pub const fn tag_byte(self) -> u8 {
        self as u8
    }

    /// Whether a payload follows the tag byte
    pub const fn has_payload(self) -> bool {
        !matches!(self, ValueType::Null | ValueType::Tombstone)
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ValueType::Null => "Null",
            ValueType::Tombstone => "Tombstone",
            ValueType::ObjRef => "ObjRef",
            ValueType::VarInt => "VarInt",
            ValueType::Ptr64 => "Ptr64",
        };
        f.write_str(name)
    }
}

/// True if `nibble` names a value type this revision understands
pub const fn is_known(nibble: u8) -> bool {
    nibble <= ValueType::MAX_KNOWN
}

/// Value type nibble of a tag byte
pub const fn extract_value_type(tag: u8) -> u8 {
    tag & LOW_BITS_MASK
}

/// True if the reserved nibble of a tag byte is zero
pub const fn are_high_bits_zero(tag: u8) -> bool {
    tag & HIGH_BITS_MASK == 0
}

/// Validate a tag byte read from a payload
///
/// The reserved-bits check runs first, so `0x15` is a format error rather
/// than an unknown type.
pub fn validate_key_value_pair_type(tag: u8) -> Result<ValueType> {
    if !are_high_bits_zero(tag) {
        return Err(Error::DiffPayloadFormat {
            message: format!(
                "KeyValuePairType high 4 bits must be 0, but got 0x{:02X}",
                tag
            ),
        });
    }
    ValueType::from_nibble(extract_value_type(tag)).ok_or(Error::UnknownValueType { tag })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_range() {
        for nibble in 0..=4 {
            assert!(is_known(nibble));
            assert!(ValueType::from_nibble(nibble).is_some());
        }
        for nibble in 5..=15 {
            assert!(!is_known(nibble));
            assert!(ValueType::from_nibble(nibble).is_none());
        }
    }

    #[test]
    fn test_payload_presence() {
        assert!(!ValueType::Null.has_payload());
        assert!(!ValueType::Tombstone.has_payload());
        assert!(ValueType::ObjRef.has_payload());
        assert!(ValueType::VarInt.has_payload());
        assert!(ValueType::Ptr64.has_payload());
    }

    #[test]
    fn test_nibble_helpers() {
        assert_eq!(extract_value_type(0x13), 0x3);
        assert!(are_high_bits_zero(0x04));
        assert!(!are_high_bits_zero(0x10));
    }

    #[test]
    fn test_validate_accepts_every_known_tag() {
        for vt in [
            ValueType::Null,
            ValueType::Tombstone,
            ValueType::ObjRef,
            ValueType::VarInt,
            ValueType::Ptr64,
        ] {
            assert_eq!(validate_key_value_pair_type(vt.tag_byte()).unwrap(), vt);
        }
    }

    #[test]
    fn test_validate_high_bits_is_format_error() {
        let err = validate_key_value_pair_type(0x10).unwrap_err();
        assert!(matches!(err, Error::DiffPayloadFormat { .. }));
        assert!(err.to_string().contains("high 4 bits"));
    }

    #[test]
    fn test_high_bits_checked_before_unknown_type() {
        let err = validate_key_value_pair_type(0xF5).unwrap_err();
        assert!(matches!(err, Error::DiffPayloadFormat { .. }));
    }

    #[test]
    fn test_validate_unknown_low_nibble() {
        for tag in 0x05..=0x0F {
            assert!(matches!(
                validate_key_value_pair_type(tag),
                Err(Error::UnknownValueType { tag: t }) if t == tag
            ));
        }
    }
}
