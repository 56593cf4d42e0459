//! Opaque typed payloads.
//!
//! Every value that crosses the entity stream (command arguments, replies,
//! set elements, map keys, register contents) travels as a [`Payload`]: an
//! opaque byte string tagged with a type URL naming its schema. The envelope
//! is also the identity for set- and map-typed CRDTs: two payloads are equal
//! iff both the type URL and the bytes match octet for octet, independent of
//! whatever schema the bytes decode to.

use std::hash::BuildHasher;
use std::sync::OnceLock;

use ahash::RandomState;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Type-URL prefix for schema-typed messages. Stripped before dispatch.
pub const DEFAULT_TYPE_URL_PREFIX: &str = "type.googleapis.com";

/// Type-URL prefix for primitive payloads.
///
/// Primitives deliberately do not use the `type.googleapis.com` namespace so
/// that they survive round-trips through user functions written in other
/// languages.
pub const PRIMITIVE_TYPE_URL_PREFIX: &str = "p.stately.dev";

/// Type URL of a primitive `bool` payload (one byte, `0` or `1`).
pub const TYPE_URL_BOOL: &str = "p.stately.dev/bool";
/// Type URL of a primitive byte-string payload (raw octets).
pub const TYPE_URL_BYTES: &str = "p.stately.dev/bytes";
/// Type URL of a primitive `i32` payload (4 bytes, little-endian).
pub const TYPE_URL_INT32: &str = "p.stately.dev/int32";
/// Type URL of a primitive `i64` payload (8 bytes, little-endian).
pub const TYPE_URL_INT64: &str = "p.stately.dev/int64";
/// Type URL of a primitive `f32` payload (IEEE-754 bits, little-endian).
pub const TYPE_URL_FLOAT: &str = "p.stately.dev/float";
/// Type URL of a primitive `f64` payload (IEEE-754 bits, little-endian).
pub const TYPE_URL_DOUBLE: &str = "p.stately.dev/double";
/// Type URL of a primitive UTF-8 string payload.
pub const TYPE_URL_STRING: &str = "p.stately.dev/string";

/// Errors produced when reading a primitive payload back out of its envelope.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// The payload carries a different type URL than the accessor expects.
    #[error("unexpected type url: expected {expected}, got {got}")]
    UnexpectedTypeUrl {
        /// The type URL the accessor requires.
        expected: &'static str,
        /// The type URL found on the payload.
        got: String,
    },
    /// The payload body is shorter or longer than the fixed-width encoding.
    #[error("malformed {type_url} payload: expected {expected} bytes, got {got}")]
    InvalidLength {
        /// Type URL of the offending payload.
        type_url: &'static str,
        /// Required byte length.
        expected: usize,
        /// Actual byte length.
        got: usize,
    },
    /// A string payload does not hold valid UTF-8.
    #[error("string payload is not valid utf-8")]
    InvalidUtf8,
}

/// An opaque byte string plus the type URL naming its schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Payload {
    /// Schema identifier, e.g. `type.googleapis.com/example.shop.AddLineItem`.
    pub type_url: String,
    /// Encoded message bytes.
    pub value: Vec<u8>,
}

impl Payload {
    /// Creates a payload from a type URL and raw bytes.
    #[must_use]
    pub fn new(type_url: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            type_url: type_url.into(),
            value,
        }
    }

    /// The fully qualified type name with the default prefix stripped.
    #[must_use]
    pub fn type_name(&self) -> &str {
        self.type_url
            .strip_prefix(DEFAULT_TYPE_URL_PREFIX)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(&self.type_url)
    }

    /// Wraps a `bool` in its primitive envelope.
    #[must_use]
    pub fn from_bool(value: bool) -> Self {
        Self::new(TYPE_URL_BOOL, vec![u8::from(value)])
    }

    /// Wraps raw bytes in their primitive envelope.
    #[must_use]
    pub fn from_bytes(value: Vec<u8>) -> Self {
        Self::new(TYPE_URL_BYTES, value)
    }

    /// Wraps an `i32` in its primitive envelope.
    #[must_use]
    pub fn from_i32(value: i32) -> Self {
        Self::new(TYPE_URL_INT32, value.to_le_bytes().to_vec())
    }

    /// Wraps an `i64` in its primitive envelope.
    #[must_use]
    pub fn from_i64(value: i64) -> Self {
        Self::new(TYPE_URL_INT64, value.to_le_bytes().to_vec())
    }

    /// Wraps an `f32` in its primitive envelope.
    #[must_use]
    pub fn from_f32(value: f32) -> Self {
        Self::new(TYPE_URL_FLOAT, value.to_le_bytes().to_vec())
    }

    /// Wraps an `f64` in its primitive envelope.
    #[must_use]
    pub fn from_f64(value: f64) -> Self {
        Self::new(TYPE_URL_DOUBLE, value.to_le_bytes().to_vec())
    }

    /// Wraps a string in its primitive envelope.
    #[must_use]
    pub fn from_string(value: impl Into<String>) -> Self {
        Self::new(TYPE_URL_STRING, value.into().into_bytes())
    }

    /// Reads a primitive `bool` payload.
    pub fn to_bool(&self) -> Result<bool, PayloadError> {
        let bytes = self.primitive_bytes(TYPE_URL_BOOL, 1)?;
        Ok(bytes[0] != 0)
    }

    /// Reads a primitive byte-string payload.
    pub fn to_bytes(&self) -> Result<&[u8], PayloadError> {
        self.expect_type(TYPE_URL_BYTES)?;
        Ok(&self.value)
    }

    /// Reads a primitive `i32` payload.
    pub fn to_i32(&self) -> Result<i32, PayloadError> {
        let bytes = self.primitive_bytes(TYPE_URL_INT32, 4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Reads a primitive `i64` payload.
    pub fn to_i64(&self) -> Result<i64, PayloadError> {
        let bytes = self.primitive_bytes(TYPE_URL_INT64, 8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(i64::from_le_bytes(buf))
    }

    /// Reads a primitive `f32` payload.
    pub fn to_f32(&self) -> Result<f32, PayloadError> {
        let bytes = self.primitive_bytes(TYPE_URL_FLOAT, 4)?;
        Ok(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Reads a primitive `f64` payload.
    pub fn to_f64(&self) -> Result<f64, PayloadError> {
        let bytes = self.primitive_bytes(TYPE_URL_DOUBLE, 8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(f64::from_le_bytes(buf))
    }

    /// Reads a primitive string payload.
    pub fn to_str(&self) -> Result<&str, PayloadError> {
        self.expect_type(TYPE_URL_STRING)?;
        std::str::from_utf8(&self.value).map_err(|_| PayloadError::InvalidUtf8)
    }

    fn expect_type(&self, expected: &'static str) -> Result<(), PayloadError> {
        if self.type_url == expected {
            Ok(())
        } else {
            Err(PayloadError::UnexpectedTypeUrl {
                expected,
                got: self.type_url.clone(),
            })
        }
    }

    fn primitive_bytes(
        &self,
        type_url: &'static str,
        len: usize,
    ) -> Result<&[u8], PayloadError> {
        self.expect_type(type_url)?;
        if self.value.len() != len {
            return Err(PayloadError::InvalidLength {
                type_url,
                expected: len,
                got: self.value.len(),
            });
        }
        Ok(&self.value)
    }
}

static HASHER: OnceLock<RandomState> = OnceLock::new();

/// A clone of the process-wide keyed hasher.
///
/// The seed is drawn once per process; every payload-keyed set and map in the
/// CRDT algebra buckets with a clone of this state so that hashes agree
/// across replicas within one process lifetime. The hash never crosses the
/// wire.
#[must_use]
pub fn shared_hasher() -> RandomState {
    HASHER.get_or_init(RandomState::new).clone()
}

/// The keyed 64-bit hash of a payload's typed envelope.
#[must_use]
pub fn stable_hash(payload: &Payload) -> u64 {
    shared_hasher().hash_one(payload)
}
