//! Core types for StateJournal
//!
//! This crate defines the leaf vocabulary shared by every other crate:
//! - [`ObjectId`]: identity of a durable object inside a workspace
//! - [`ValueType`]: the tag set of the diff payload format and its byte rules
//! - [`Value`]: values stored in durable dictionaries
//! - [`varint`]: LEB128 / ZigZag primitives used by every byte format
//! - [`Error`]: the unified error type

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;
pub mod value;
pub mod value_type;
pub mod varint;

pub use error::{Error, Result};
pub use types::ObjectId;
pub use value::Value;
pub use value_type::ValueType;
