//! Object identity
//!
//! [`ObjectId`] is a `u64` with a reserved low range:
//! - `0`: the version index
//! - `1..=15`: reserved for future well-known objects
//! - `16..`: user objects, allocated monotonically by a workspace

use serde::{Deserialize, Serialize};

/// Identifier of a durable object within a workspace
///
/// Ids are never reused within a workspace's lifetime.
///
/// # Examples
///
/// ```
/// use statejournal_core::ObjectId;
///
/// let id = ObjectId::new(16);
/// assert!(!id.is_reserved());
/// assert!(ObjectId::VERSION_INDEX.is_reserved());
/// assert_eq!(id.next(), ObjectId::new(17));
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct ObjectId(u64);

impl ObjectId {
    /// Well-known id of the version index
    pub const VERSION_INDEX: ObjectId = ObjectId(0);

    /// First id handed out to user objects
    pub const FIRST_USER: ObjectId = ObjectId(16);

    /// Wrap a raw id
    pub const fn new(raw: u64) -> Self {
        ObjectId(raw)
    }

    /// Raw `u64` value
    pub const fn get(self) -> u64 {
        self.0
    }

    /// True for ids in the reserved range `0..16`
    pub const fn is_reserved(self) -> bool {
        self.0 < Self::FIRST_USER.0
    }

    /// The id following this one
    ///
    /// Callers allocating ids check for `u64::MAX` first, or use
    /// [`checked_next`](Self::checked_next).
    pub const fn next(self) -> Self {
        ObjectId(self.0 + 1)
    }

    /// The id following this one, `None` at `u64::MAX`
    pub const fn checked_next(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(raw) => Some(ObjectId(raw)),
            None => None,
        }
    }
}

impl From<u64> for ObjectId {
    fn from(raw: u64) -> Self {
        ObjectId(raw)
    }
}

impl From<ObjectId> for u64 {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_range_boundary() {
        assert!(ObjectId::new(0).is_reserved());
        assert!(ObjectId::new(15).is_reserved());
        assert!(!ObjectId::new(16).is_reserved());
        assert_eq!(ObjectId::FIRST_USER.get(), 16);
    }

    #[test]
    fn test_ordering_follows_raw_value() {
        let mut ids = vec![ObjectId::new(20), ObjectId::new(16), ObjectId::new(18)];
        ids.sort();
        assert_eq!(ids, vec![ObjectId::new(16), ObjectId::new(18), ObjectId::new(20)]);
    }

    #[test]
    fn test_serializes_as_plain_integer() {
        let json = serde_json::to_string(&ObjectId::new(42)).unwrap();
        assert_eq!(json, "42");
        let back: ObjectId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ObjectId::new(42));
    }

    #[test]
    fn test_checked_next_stops_at_max() {
        assert_eq!(ObjectId::new(16).checked_next(), Some(ObjectId::new(17)));
        assert_eq!(ObjectId::new(u64::MAX).checked_next(), None);
    }
}
