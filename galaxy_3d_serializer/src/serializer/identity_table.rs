/// Identity table - identity → live record, for one save or load.
///
/// Identities are dense and zero-based: the record at index `i` is the `i`-th
/// record reached through an owning edge. Entries also keep where the record
/// sits in the stream, which makes the table useful to inspection tooling.

use std::fmt;
use std::sync::Arc;
use rustc_hash::FxHashMap;
use crate::record::RecordRef;
use crate::registry::TypeTag;
use super::stream::Identity;

/// One record of the identity table.
#[derive(Clone)]
pub struct IdentityEntry {
    /// The live record
    pub record: RecordRef,
    /// Concrete type tag
    pub type_tag: TypeTag,
    /// Layout version (as stored in the stream on load)
    pub version: u32,
    /// Stream offset of the record header
    pub offset: usize,
    /// Bytes spanned by the header and the record's owned subtree
    pub size: usize,
}

impl fmt::Debug for IdentityEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityEntry")
            .field("type_tag", &self.type_tag)
            .field("version", &self.version)
            .field("offset", &self.offset)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Growable mapping identity → record.
#[derive(Debug, Clone, Default)]
pub struct IdentityTable {
    entries: Vec<IdentityEntry>,
}

impl IdentityTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Append an entry, returning its identity
    pub(crate) fn push(&mut self, entry: IdentityEntry) -> Identity {
        let identity = self.entries.len() as Identity;
        self.entries.push(entry);
        identity
    }

    /// Mutable access to an entry
    pub(crate) fn entry_mut(&mut self, identity: Identity) -> Option<&mut IdentityEntry> {
        self.entries.get_mut(identity as usize)
    }

    /// Entry of an identity
    pub fn get(&self, identity: Identity) -> Option<&IdentityEntry> {
        self.entries.get(identity as usize)
    }

    /// Record of an identity
    pub fn record(&self, identity: Identity) -> Option<&RecordRef> {
        self.get(identity).map(|entry| &entry.record)
    }

    /// Root record (identity 0)
    pub fn root(&self) -> Option<&RecordRef> {
        self.record(0)
    }

    /// Identity of a record handle, if it belongs to this table
    pub fn identity_of(&self, record: &RecordRef) -> Option<Identity> {
        self.entries
            .iter()
            .position(|entry| Arc::ptr_eq(&entry.record, record))
            .map(|index| index as Identity)
    }

    /// Iterate over `(identity, entry)` pairs in identity order
    pub fn iter(&self) -> impl Iterator<Item = (Identity, &IdentityEntry)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, entry)| (index as Identity, entry))
    }

    /// Number of records per type tag
    pub fn count_by_type(&self) -> FxHashMap<TypeTag, usize> {
        let mut counts = FxHashMap::default();
        for entry in &self.entries {
            *counts.entry(entry.type_tag).or_insert(0) += 1;
        }
        counts
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table holds no record
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "identity_table_tests.rs"]
mod tests;
