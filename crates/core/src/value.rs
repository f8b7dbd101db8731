//! Values stored in durable dictionaries
//!
//! [`Value`] is deliberately wider than the diff payload tag set: a dictionary
//! can hold any of the variants in memory, but only the kinds listed in
//! [`Value::value_type`] survive a commit. Writing a pending diff that
//! contains another kind fails with [`Error::UnsupportedValueType`].
//!
//! ## Equality Rules
//!
//! - Different variants are never equal (`Int(1) != Ptr64(1)`)
//! - Float uses IEEE-754 equality: `NaN != NaN`, `-0.0 == 0.0`
//!
//! [`Error::UnsupportedValueType`]: crate::Error::UnsupportedValueType

use crate::types::ObjectId;
use crate::value_type::ValueType;
use serde::{Deserialize, Serialize};

/// A dictionary value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Explicit null (distinct from an absent key)
    Null,

    /// Boolean (in-memory only)
    Bool(bool),

    /// 64-bit signed integer, persisted as a ZigZag varint
    Int(i64),

    /// 64-bit float (in-memory only)
    Float(f64),

    /// UTF-8 string (in-memory only)
    String(String),

    /// Binary data (in-memory only)
    Bytes(Vec<u8>),

    /// Reference to another durable object, persisted as a varuint id
    ObjRef(ObjectId),

    /// Raw 64-bit pointer, persisted as 8 little-endian bytes
    Ptr64(u64),
}

impl Value {
    /// Returns the variant name (for error messages)
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::String(_) => "String",
            Value::Bytes(_) => "Bytes",
            Value::ObjRef(_) => "ObjRef",
            Value::Ptr64(_) => "Ptr64",
        }
    }

    /// Diff payload tag this value is written with, `None` if it cannot be persisted
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Value::Null => Some(ValueType::Null),
            Value::Int(_) => Some(ValueType::VarInt),
            Value::ObjRef(_) => Some(ValueType::ObjRef),
            Value::Ptr64(_) => Some(ValueType::Ptr64),
            Value::Bool(_) | Value::Float(_) | Value::String(_) | Value::Bytes(_) => None,
        }
    }

    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get as i64
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as f64
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Try to get as string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as bytes slice
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Try to get as an object reference
    pub fn as_obj_ref(&self) -> Option<ObjectId> {
        match self {
            Value::ObjRef(id) => Some(*id),
            _ => None,
        }
    }

    /// Try to get as a raw pointer
    pub fn as_ptr64(&self) -> Option<u64> {
        match self {
            Value::Ptr64(p) => Some(*p),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<ObjectId> for Value {
    fn from(v: ObjectId) -> Self {
        Value::ObjRef(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
