//! Unified error type for StateJournal.
//!
//! Every fallible operation in the workspace returns [`Result`]. Two families
//! share the enum:
//!
//! - data failures (codec, lookup, storage) that callers are expected to
//!   branch on, e.g. a corrupt payload or a missing object
//! - contract violations (detached access, writer misuse, double complete)
//!   that indicate a bug in the caller
//!
//! [`Error::is_contract_violation`] tells the two apart.

use crate::types::ObjectId;
use thiserror::Error;

/// All StateJournal errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A detached object was accessed
    #[error("object {object_id} has been detached and cannot be accessed")]
    ObjectDetached {
        /// Id of the detached object
        object_id: ObjectId,
    },

    /// No object with this id exists in memory or storage
    #[error("object {object_id} not found")]
    ObjectNotFound {
        /// Requested id
        object_id: ObjectId,
    },

    /// The resolved object is not of the requested type
    #[error("object {object_id} type mismatch: expected {expected}, actual {actual}")]
    ObjectTypeMismatch {
        /// Requested id
        object_id: ObjectId,
        /// Type the caller asked for
        expected: &'static str,
        /// Type of the resident or loaded instance
        actual: &'static str,
    },

    /// Malformed diff payload (reserved bits, key overflow)
    #[error("diff payload format error: {message}")]
    DiffPayloadFormat {
        /// Description of the violation
        message: String,
    },

    /// Tag low nibble outside the known value type range
    #[error("unknown value type 0x{tag:02X}")]
    UnknownValueType {
        /// Offending tag byte
        tag: u8,
    },

    /// Keys in a diff payload are not strictly ascending
    #[error("diff payload keys must be sorted and unique: found key {current} after {previous}")]
    DiffKeySorting {
        /// Key of the previous pair
        previous: u64,
        /// Key computed for the current pair
        current: u64,
    },

    /// A declared field runs past the end of the buffer
    #[error("unexpected end of diff payload while {context}")]
    DiffPayloadEof {
        /// Field being read when the buffer ran out
        context: String,
    },

    /// Caller passed an argument that violates the operation's contract
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation is not valid in the current state
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// A value kind the diff payload format cannot encode
    #[error("Unsupported value type: {type_name}")]
    UnsupportedValueType {
        /// Name of the value kind
        type_name: &'static str,
    },

    /// Accessor called on a default-constructed lazy reference
    #[error("lazy reference is not initialized")]
    LazyRefNotInitialized,

    /// Resolution of a lazy reference failed
    #[error("failed to load referenced object {object_id}: {source}")]
    LazyLoad {
        /// Referenced id
        object_id: ObjectId,
        /// Underlying failure
        #[source]
        source: Box<Error>,
    },

    /// Truncated or overlong varint
    #[error("varint decode error: {0}")]
    VarIntDecode(String),

    /// Varint used more bytes than its value requires
    #[error("non-canonical varint: value {value} used {actual} bytes, expected {expected}")]
    VarIntNonCanonical {
        /// Decoded value
        value: u64,
        /// Bytes consumed
        actual: usize,
        /// Minimal encoding length
        expected: usize,
    },

    /// Unknown or malformed frame tag
    #[error("unknown frame tag 0x{tag:08X}: {reason}")]
    UnknownFrameTag {
        /// Raw tag value
        tag: u32,
        /// Which rule rejected it
        reason: String,
    },

    /// Frame header, length or checksum does not check out
    #[error("corrupt frame at {position}: {reason}")]
    FrameCorrupt {
        /// Log position of the frame
        position: u64,
        /// What was wrong
        reason: String,
    },

    /// A fixed-layout record ended before one of its fields
    #[error("{record} truncated while reading {field}")]
    RecordTruncated {
        /// Record kind
        record: &'static str,
        /// Field being read
        field: &'static str,
    },

    /// I/O error from a byte sink
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error (bug or invariant violation)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for StateJournal operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build a [`Error::DiffPayloadEof`]
    pub fn eof(context: impl Into<String>) -> Self {
        Error::DiffPayloadEof {
            context: context.into(),
        }
    }

    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::ObjectNotFound { .. })
    }

    /// Check if this is a detached-access error.
    pub fn is_detached(&self) -> bool {
        matches!(self, Error::ObjectDetached { .. })
    }

    /// Check if this error reports malformed persisted bytes.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Error::DiffPayloadFormat { .. }
                | Error::UnknownValueType { .. }
                | Error::DiffKeySorting { .. }
                | Error::DiffPayloadEof { .. }
                | Error::VarIntDecode(_)
                | Error::VarIntNonCanonical { .. }
                | Error::UnknownFrameTag { .. }
                | Error::FrameCorrupt { .. }
                | Error::RecordTruncated { .. }
        )
    }

    /// Check if this error signals misuse by the caller rather than bad data.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Error::ObjectDetached { .. }
                | Error::InvalidArgument(_)
                | Error::InvalidOperation(_)
                | Error::LazyRefNotInitialized
        )
    }

    /// Id of the object this error is about, if any.
    pub fn object_id(&self) -> Option<ObjectId> {
        match self {
            Error::ObjectDetached { object_id }
            | Error::ObjectNotFound { object_id }
            | Error::ObjectTypeMismatch { object_id, .. }
            | Error::LazyLoad { object_id, .. } => Some(*object_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detached_message_carries_id() {
        let err = Error::ObjectDetached {
            object_id: ObjectId::new(42),
        };
        assert!(err.to_string().contains("42"));
        assert!(err.is_detached());
        assert!(err.is_contract_violation());
        assert_eq!(err.object_id(), Some(ObjectId::new(42)));
    }

    #[test]
    fn test_lazy_load_wraps_source() {
        let err = Error::LazyLoad {
            object_id: ObjectId::new(99),
            source: Box::new(Error::ObjectNotFound {
                object_id: ObjectId::new(99),
            }),
        };
        let msg = err.to_string();
        assert!(msg.contains("99"));
        assert!(msg.contains("not found"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_format_classification() {
        assert!(Error::UnknownValueType { tag: 0x05 }.is_format_error());
        assert!(Error::eof("reading PairCount").is_format_error());
        assert!(!Error::InvalidOperation("x".into()).is_format_error());
        assert!(!Error::ObjectNotFound {
            object_id: ObjectId::new(1)
        }
        .is_format_error());
    }

    #[test]
    fn test_unsupported_value_type_message() {
        let err = Error::UnsupportedValueType { type_name: "String" };
        assert!(err.to_string().contains("Unsupported value type"));
    }
}
