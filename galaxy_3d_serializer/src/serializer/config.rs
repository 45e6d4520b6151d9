/// Serializer configuration.

use super::stream::NULL_IDENTITY;

/// Limits and policies applied by a `Serializer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Maximum number of records (identities) in one save or load
    pub max_records: usize,

    /// Maximum element count of one array field
    pub max_array_len: usize,

    /// Accept bytes after the root record's subtree when loading
    pub allow_trailing_bytes: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // The last identity value encodes a null reference
            max_records: NULL_IDENTITY as usize,
            max_array_len: 1 << 24,
            allow_trailing_bytes: false,
        }
    }
}
