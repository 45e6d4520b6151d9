//! Error types for the Galaxy3D serializer
//!
//! This module defines the single error type returned by the type registry,
//! the save and load passes, and the engine singleton. Every error is
//! unrecoverable for the operation that raised it: no partially built graph
//! or partially written buffer is ever returned alongside an error.

use std::fmt;
use crate::registry::TypeTag;
use crate::serializer::Identity;

/// Result type for Galaxy3D serializer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Galaxy3D serializer errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Type tag found in a stream (or used by a record) is not registered
    UnknownType(TypeTag),

    /// Save: a reference points to a record that no owning edge reaches
    DanglingReference {
        /// Identity of the record holding the reference
        referrer: Identity,
    },

    /// Load: a reference identity is outside the identity table
    BrokenReference {
        /// Identity read from the stream
        identity: Identity,
        /// Number of records in the identity table
        table_len: usize,
    },

    /// Load ran past the end of the buffer
    TruncatedStream {
        /// Cursor position when the read was attempted
        offset: usize,
        /// Number of bytes requested
        requested: usize,
        /// Number of bytes left in the buffer
        available: usize,
    },

    /// A record's byte size disagrees with the bytes actually produced or consumed
    SizeMismatch {
        /// Identity of the record whose size disagrees
        identity: Identity,
        /// Size recorded (simulate run on save, header on load)
        expected: usize,
        /// Size actually produced or consumed
        actual: usize,
    },

    /// The leading token of a buffer is not the package signature
    InvalidSignature(u32),

    /// A type tag disagrees with the one the registry or header expects
    TypeMismatch {
        /// Tag that was expected
        expected: TypeTag,
        /// Tag that was found
        found: TypeTag,
    },

    /// Structural corruption not covered by a more specific variant
    InvalidStream(String),

    /// The object graph cannot be serialized as given
    InvalidGraph(String),

    /// A record is reached through more than one owning edge
    DuplicateOwnership {
        /// Identity assigned when the record was first reached
        identity: Identity,
    },

    /// A type tag is registered twice
    DuplicateType(TypeTag),

    /// A reserved type tag (null, signature) is used for registration
    ReservedType(TypeTag),

    /// A configured limit was exceeded
    LimitExceeded(String),

    /// Initialization failed (engine singleton, registry)
    InitializationFailed(String),

    /// A mutex guarding a record or singleton is poisoned
    LockPoisoned(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnknownType(tag) => write!(f, "Unknown type: {}", tag),
            Error::DanglingReference { referrer } => {
                write!(f, "Dangling reference: record {} references a record with no owning path", referrer)
            }
            Error::BrokenReference { identity, table_len } => {
                write!(f, "Broken reference: identity {} out of range (table has {} records)", identity, table_len)
            }
            Error::TruncatedStream { offset, requested, available } => {
                write!(f, "Truncated stream: {} bytes requested at offset {}, {} available", requested, offset, available)
            }
            Error::SizeMismatch { identity, expected, actual } => {
                write!(f, "Size mismatch for record {}: expected {} bytes, got {}", identity, expected, actual)
            }
            Error::InvalidSignature(found) => write!(f, "Invalid signature: 0x{:08X}", found),
            Error::TypeMismatch { expected, found } => {
                write!(f, "Type mismatch: expected {}, found {}", expected, found)
            }
            Error::InvalidStream(msg) => write!(f, "Invalid stream: {}", msg),
            Error::InvalidGraph(msg) => write!(f, "Invalid graph: {}", msg),
            Error::DuplicateOwnership { identity } => {
                write!(f, "Duplicate ownership: record {} is reached by more than one owning edge", identity)
            }
            Error::DuplicateType(tag) => write!(f, "Duplicate type: {} is already registered", tag),
            Error::ReservedType(tag) => write!(f, "Reserved type: {} cannot be registered", tag),
            Error::LimitExceeded(msg) => write!(f, "Limit exceeded: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::LockPoisoned(msg) => write!(f, "Lock poisoned: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ===== ERROR MACROS =====

/// Log an error at ERROR severity (with file:line) and evaluate to it
///
/// # Example
///
/// ```ignore
/// let err = engine_err!("galaxy3d::TypeRegistry", Error::UnknownType(tag));
/// ```
#[macro_export]
macro_rules! engine_err {
    ($source:expr, $error:expr) => {{
        let error = $error;
        $crate::engine_error!($source, "{}", error);
        error
    }};
}

/// Log an error at ERROR severity and return it from the current function
///
/// # Example
///
/// ```ignore
/// engine_bail!("galaxy3d::Serializer", Error::InvalidSignature(found));
/// ```
#[macro_export]
macro_rules! engine_bail {
    ($source:expr, $error:expr) => {
        return Err($crate::engine_err!($source, $error))
    };
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
