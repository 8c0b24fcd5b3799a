//! Typed scalar values for the key-value side store.
//!
//! The key-value store holds process bookkeeping (index progress fields and
//! similar scalars). The value set is deliberately closed: anything that is
//! not a bool, integer, large integer or string is unrepresentable.

use crate::error::StorageError;

/// A scalar value in the key-value store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvValue {
    Bool(bool),
    Int(i64),
    BigInt(i128),
    Text(String),
}

impl KvValue {
    /// The name of this value's type, used in error messages and for
    /// persistence tagging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::BigInt(_) => "bigint",
            Self::Text(_) => "text",
        }
    }

    /// Read as bool; [`StorageError::InvalidValueType`] otherwise.
    pub fn as_bool(&self) -> Result<bool, StorageError> {
        match self {
            Self::Bool(b) => Ok(*b),
            other => Err(type_error("bool", other)),
        }
    }

    /// Read as i64; [`StorageError::InvalidValueType`] otherwise.
    pub fn as_int(&self) -> Result<i64, StorageError> {
        match self {
            Self::Int(n) => Ok(*n),
            other => Err(type_error("int", other)),
        }
    }

    /// Read as i128; [`StorageError::InvalidValueType`] otherwise.
    pub fn as_bigint(&self) -> Result<i128, StorageError> {
        match self {
            Self::BigInt(n) => Ok(*n),
            other => Err(type_error("bigint", other)),
        }
    }

    /// Read as string slice; [`StorageError::InvalidValueType`] otherwise.
    pub fn as_text(&self) -> Result<&str, StorageError> {
        match self {
            Self::Text(s) => Ok(s),
            other => Err(type_error("text", other)),
        }
    }
}

fn type_error(expected: &str, found: &KvValue) -> StorageError {
    StorageError::InvalidValueType {
        expected: expected.to_string(),
        found: found.kind().to_string(),
    }
}

impl std::fmt::Display for KvValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::BigInt(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}
