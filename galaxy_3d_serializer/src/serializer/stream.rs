/// Stream layout constants and the record header.
///
/// These helpers never construct records: `is_package` and `peek_root` let
/// callers vet a byte blob in O(1) before attempting a full load.

use crate::error::{Error, Result};
use crate::registry::TypeTag;

/// Per-operation sequential record identity
pub type Identity = u32;

/// Identity written in place of a reference that is `None`
pub const NULL_IDENTITY: Identity = u32::MAX;

/// Width of every framing integer (tag, version, identity, size, count)
pub(crate) const WORD_SIZE: usize = 4;

/// Width of the signature token
pub(crate) const SIGNATURE_SIZE: usize = WORD_SIZE;

/// Width of a record header
pub const HEADER_SIZE: usize = 4 * WORD_SIZE;

/// Byte offset of the size field within a header
pub(crate) const HEADER_SIZE_FIELD: usize = 3 * WORD_SIZE;

/// Header written in front of every owned record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Concrete type tag of the record
    pub type_tag: TypeTag,
    /// Record layout version
    pub version: u32,
    /// Identity assigned to the record within its stream
    pub identity: Identity,
    /// Bytes spanned by the header and the record's owned subtree
    pub size: u32,
}

impl RecordHeader {
    /// Encode as four little-endian words
    pub(crate) fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.type_tag.0.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.version.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.identity.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.size.to_le_bytes());
        bytes
    }

    /// Decode from at least `HEADER_SIZE` bytes
    pub(crate) fn decode(bytes: &[u8]) -> Option<Self> {
        Some(Self {
            type_tag: TypeTag(read_u32_at(bytes, 0)?),
            version: read_u32_at(bytes, 4)?,
            identity: read_u32_at(bytes, 8)?,
            size: read_u32_at(bytes, 12)?,
        })
    }
}

/// Read a little-endian `u32` at `offset`, if the buffer is long enough
pub(crate) fn read_u32_at(bytes: &[u8], offset: usize) -> Option<u32> {
    let end = offset.checked_add(WORD_SIZE)?;
    let word = bytes.get(offset..end)?;
    Some(u32::from_le_bytes([word[0], word[1], word[2], word[3]]))
}

/// Whether a byte blob starts with the package signature
///
/// O(1); constructs nothing.
pub fn is_package(bytes: &[u8]) -> bool {
    read_u32_at(bytes, 0) == Some(TypeTag::SIGNATURE.0)
}

/// Read the root record header without loading anything
///
/// # Errors
///
/// - `TruncatedStream` if the blob is shorter than signature + header
/// - `InvalidSignature` if the leading token is not the package signature
pub fn peek_root(bytes: &[u8]) -> Result<RecordHeader> {
    let signature = read_u32_at(bytes, 0).ok_or(Error::TruncatedStream {
        offset: 0,
        requested: SIGNATURE_SIZE,
        available: bytes.len(),
    })?;
    if signature != TypeTag::SIGNATURE.0 {
        return Err(Error::InvalidSignature(signature));
    }

    let header_bytes = &bytes[SIGNATURE_SIZE..];
    RecordHeader::decode(header_bytes).ok_or(Error::TruncatedStream {
        offset: SIGNATURE_SIZE,
        requested: HEADER_SIZE,
        available: header_bytes.len(),
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "stream_tests.rs"]
mod tests;
