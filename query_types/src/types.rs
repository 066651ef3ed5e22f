//! Key part definitions
//!
//! This module provides the primitive values a query key is built from
//! and the conversions from plain Rust types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single primitive element of a query key
///
/// Parts compare by exact value. `Int(1)` and `Text("1")` are different parts;
/// callers must pass the same type for the same logical parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyPart {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
}

impl KeyPart {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            KeyPart::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            KeyPart::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Null => f.write_str("null"),
            KeyPart::Bool(b) => write!(f, "{}", b),
            KeyPart::Int(i) => write!(f, "{}", i),
            KeyPart::Text(s) => write!(f, "{:?}", s),
        }
    }
}

/// Convert basic Rust types to KeyPart
impl From<String> for KeyPart {
    fn from(val: String) -> Self {
        KeyPart::Text(val)
    }
}

impl From<&str> for KeyPart {
    fn from(val: &str) -> Self {
        KeyPart::Text(val.to_string())
    }
}

impl From<&String> for KeyPart {
    fn from(val: &String) -> Self {
        KeyPart::Text(val.clone())
    }
}

impl From<i64> for KeyPart {
    fn from(val: i64) -> Self {
        KeyPart::Int(val)
    }
}

impl From<i32> for KeyPart {
    fn from(val: i32) -> Self {
        KeyPart::Int(val as i64)
    }
}

impl From<u32> for KeyPart {
    fn from(val: u32) -> Self {
        KeyPart::Int(val as i64)
    }
}

impl From<usize> for KeyPart {
    fn from(val: usize) -> Self {
        KeyPart::Int(i64::try_from(val).unwrap_or(i64::MAX))
    }
}

impl From<bool> for KeyPart {
    fn from(val: bool) -> Self {
        KeyPart::Bool(val)
    }
}

impl<T> From<Option<T>> for KeyPart
where
    T: Into<KeyPart>,
{
    fn from(val: Option<T>) -> Self {
        match val {
            Some(v) => v.into(),
            None => KeyPart::Null,
        }
    }
}
