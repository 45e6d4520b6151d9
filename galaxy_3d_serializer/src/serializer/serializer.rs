/// Serializer - the driver shared by the save and load passes.
///
/// Owns the byte cursor, the pending-work stack, the identity table and the
/// deferred-reference queues. Records never see the passes directly: their
/// `describe_fields` calls the visitor methods (see `visitor.rs`), which
/// dispatch on the active `Pass`.
///
/// Traversal is an explicit stack of work units. A `Start` unit writes or
/// reads a record header and describes the record's fields, which collects
/// its owned children. The record's `Finish` unit is pushed next, then its
/// children on top of it, so the children's subtrees pop first and the
/// `Finish` unit sees the end of the whole subtree (post-order without
/// recursion).

use std::collections::VecDeque;
use std::sync::Arc;
use rustc_hash::FxHashMap;
use crate::error::{Error, Result};
use crate::record::{Record, RecordRef, record_key, lock_record};
use crate::registry::TypeRegistry;
use super::config::Config;
use super::identity_table::{IdentityTable, IdentityEntry};
use super::save_pass::Simulation;
use super::stream::{
    Identity, RecordHeader, HEADER_SIZE, HEADER_SIZE_FIELD, WORD_SIZE,
};

// ===== PASSES =====

/// Pass currently driving `describe_fields`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Save run 1: offsets and sizes only, nothing written
    Simulate,
    /// Save run 2: bytes written into the pre-sized buffer
    Emit,
    /// Load: fields read and owned children constructed
    Load,
    /// Load epilogue: deferred references substituted with live records
    Resolve,
}

impl Pass {
    /// Whether this pass belongs to a save
    pub fn is_saving(self) -> bool {
        matches!(self, Pass::Simulate | Pass::Emit)
    }

    /// Whether this pass belongs to a load
    pub fn is_loading(self) -> bool {
        matches!(self, Pass::Load | Pass::Resolve)
    }
}

// ===== INTERNAL WORK ITEMS =====

/// Unit of the traversal stack
pub(super) enum WorkUnit {
    /// Header + fields of a record
    Start(RecordRef),
    /// End of a record's subtree
    Finish(Identity),
}

/// Save: a reference seen during the simulate run, checked once the run drains
pub(super) struct PendingReference {
    pub(super) key: usize,
    pub(super) alive: bool,
    pub(super) referrer: Identity,
}

/// Load: identities read from reference fields, consumed by the resolve pass
pub(super) enum DeferredReference {
    Single(Identity),
    Array(Vec<Identity>),
}

// ===== SERIALIZER =====

/// Object-graph serializer.
///
/// One instance runs one save or load at a time; all per-operation state is
/// reset when an operation starts and released when it ends. Separate
/// instances may run on separate threads against the same registry.
///
/// # Example
///
/// ```ignore
/// let mut serializer = Serializer::new(&registry);
/// let bytes = serializer.save(&scene_root)?;
/// let loaded = serializer.load(&bytes)?;
/// ```
pub struct Serializer<'a> {
    pub(super) registry: &'a TypeRegistry,
    pub(super) config: Config,
    pub(super) pass: Pass,
    /// Emit output buffer
    pub(super) output: Vec<u8>,
    /// Load input buffer
    pub(super) input: &'a [u8],
    pub(super) cursor: usize,
    pub(super) work: Vec<WorkUnit>,
    /// Owned children collected while the current record is described
    pub(super) children: Vec<RecordRef>,
    pub(super) table: IdentityTable,
    pub(super) current: Identity,
    pub(super) current_version: u32,
    /// Save: record address → identity, for records reached by owning edges
    pub(super) owners: FxHashMap<usize, Identity>,
    pub(super) pending: Vec<PendingReference>,
    pub(super) simulation: Option<Simulation>,
    pub(super) deferred: VecDeque<DeferredReference>,
}

impl<'a> Serializer<'a> {
    /// Create a serializer with the default configuration
    pub fn new(registry: &'a TypeRegistry) -> Self {
        Self::with_config(registry, Config::default())
    }

    /// Create a serializer with an explicit configuration
    pub fn with_config(registry: &'a TypeRegistry, config: Config) -> Self {
        Self {
            registry,
            config,
            pass: Pass::Simulate,
            output: Vec::new(),
            input: &[],
            cursor: 0,
            work: Vec::new(),
            children: Vec::new(),
            table: IdentityTable::new(),
            current: 0,
            current_version: 0,
            owners: FxHashMap::default(),
            pending: Vec::new(),
            simulation: None,
            deferred: VecDeque::new(),
        }
    }

    /// Type registry used to validate and construct records
    pub fn registry(&self) -> &'a TypeRegistry {
        self.registry
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Pass currently driving `describe_fields`
    pub fn pass(&self) -> Pass {
        self.pass
    }

    /// Identity of the record currently being described
    pub fn current_identity(&self) -> Identity {
        self.current
    }

    /// Version of the record currently being described
    ///
    /// On save this is `Record::version()`; on load it is the version stored
    /// in the stream, which lets a record read older layouts.
    pub fn record_version(&self) -> u32 {
        self.current_version
    }

    /// Drop all per-operation state and switch to `pass`
    pub(super) fn reset(&mut self, pass: Pass) {
        self.pass = pass;
        self.output = Vec::new();
        self.input = &[];
        self.cursor = 0;
        self.work.clear();
        self.children.clear();
        self.table = IdentityTable::new();
        self.current = 0;
        self.current_version = 0;
        self.owners.clear();
        self.pending.clear();
        self.simulation = None;
        self.deferred.clear();
    }

    // ===== CURSOR PRIMITIVES =====

    /// Save: append bytes (emit) or only advance the cursor (simulate)
    pub(super) fn put(&mut self, bytes: &[u8]) {
        if self.pass == Pass::Emit {
            self.output.extend_from_slice(bytes);
        }
        self.cursor += bytes.len();
    }

    /// Save: append a little-endian word
    pub(super) fn put_u32(&mut self, value: u32) {
        self.put(&value.to_le_bytes());
    }

    /// Load: consume `len` bytes
    pub(super) fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let input: &'a [u8] = self.input;
        let available = input.len().saturating_sub(self.cursor);
        if len > available {
            return Err(Error::TruncatedStream {
                offset: self.cursor,
                requested: len,
                available,
            });
        }
        let bytes = &input[self.cursor..self.cursor + len];
        self.cursor += len;
        Ok(bytes)
    }

    /// Load: consume a little-endian word
    pub(super) fn take_u32(&mut self) -> Result<u32> {
        let bytes = self.take(WORD_SIZE)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Load: consume `count` little-endian words
    pub(super) fn take_words(&mut self, count: usize) -> Result<Vec<u32>> {
        let len = count.checked_mul(WORD_SIZE).ok_or(Error::TruncatedStream {
            offset: self.cursor,
            requested: usize::MAX,
            available: self.input.len().saturating_sub(self.cursor),
        })?;
        let bytes = self.take(len)?;
        Ok(bytes
            .chunks_exact(WORD_SIZE)
            .map(|word| u32::from_le_bytes([word[0], word[1], word[2], word[3]]))
            .collect())
    }

    /// Save: convert a length to a stream count
    pub(super) fn count_of(&self, len: usize) -> Result<u32> {
        u32::try_from(len).map_err(|_| {
            Error::InvalidGraph(format!("{} elements do not fit a 32-bit count", len))
        })
    }

    /// Save: convert an array length to a stream count within `max_array_len`
    pub(super) fn array_count_of(&self, len: usize) -> Result<u32> {
        self.check_array_len(len)?;
        self.count_of(len)
    }

    /// Load: consume an array count within `max_array_len`
    pub(super) fn take_array_count(&mut self) -> Result<usize> {
        let count = self.take_u32()? as usize;
        self.check_array_len(count)?;
        Ok(count)
    }

    fn check_array_len(&self, len: usize) -> Result<()> {
        if len > self.config.max_array_len {
            return Err(Error::LimitExceeded(format!(
                "array of {} elements in record {} (limit {})",
                len, self.current, self.config.max_array_len
            )));
        }
        Ok(())
    }

    // ===== TRAVERSAL =====

    /// Pop work units until the stack is empty
    pub(super) fn drain(&mut self) -> Result<()> {
        while let Some(unit) = self.work.pop() {
            match unit {
                WorkUnit::Start(record) => self.begin_record(record)?,
                WorkUnit::Finish(identity) => self.end_record(identity)?,
            }
        }
        Ok(())
    }

    /// Header and fields of one record, then schedule its finish and children
    fn begin_record(&mut self, record: RecordRef) -> Result<()> {
        if self.table.len() >= self.config.max_records {
            return Err(Error::LimitExceeded(format!(
                "more than {} records in one operation",
                self.config.max_records
            )));
        }
        let identity = self.table.len() as Identity;
        let offset = self.cursor;

        let mut guard = lock_record(&record)?;
        let header = match self.pass {
            Pass::Simulate | Pass::Emit => self.write_header(&record, &*guard, identity)?,
            Pass::Load => self.read_header(&*guard, identity)?,
            Pass::Resolve => {
                return Err(Error::InvalidGraph("record traversal during resolve pass".to_string()));
            }
        };

        // Registered before its fields are described
        self.table.push(IdentityEntry {
            record: record.clone(),
            type_tag: header.type_tag,
            version: header.version,
            offset,
            size: header.size as usize,
        });
        self.current = identity;
        self.current_version = header.version;

        guard.describe_fields(self)?;
        drop(guard);

        self.work.push(WorkUnit::Finish(identity));
        let children = std::mem::take(&mut self.children);
        self.work.extend(children.into_iter().rev().map(WorkUnit::Start));
        Ok(())
    }

    /// Save: claim the record's identity and write its header with a size placeholder
    fn write_header(&mut self, record: &RecordRef, current: &dyn Record, identity: Identity) -> Result<RecordHeader> {
        let type_tag = current.type_tag();
        if !self.registry.contains(type_tag) {
            return Err(Error::UnknownType(type_tag));
        }

        let key = record_key(Arc::as_ptr(record));
        if let Some(&first) = self.owners.get(&key) {
            return Err(Error::DuplicateOwnership { identity: first });
        }
        self.owners.insert(key, identity);

        if let Some(simulation) = &self.simulation {
            if simulation.owners.get(&key) != Some(&identity) {
                return Err(Error::InvalidGraph(format!(
                    "record {} was not reached in the same order as the simulate run",
                    identity
                )));
            }
        }

        let header = RecordHeader {
            type_tag,
            version: current.version(),
            identity,
            size: 0,
        };
        self.put(&header.encode());
        Ok(header)
    }

    /// Load: read and validate a record header
    fn read_header(&mut self, current: &dyn Record, identity: Identity) -> Result<RecordHeader> {
        let bytes = self.take(HEADER_SIZE)?;
        let header = RecordHeader::decode(bytes)
            .ok_or_else(|| Error::InvalidStream("short record header".to_string()))?;

        let expected = current.type_tag();
        if header.type_tag != expected {
            return Err(Error::TypeMismatch { expected, found: header.type_tag });
        }
        if header.identity != identity {
            return Err(Error::InvalidStream(format!(
                "record header carries identity {} where {} was expected",
                header.identity, identity
            )));
        }
        if (header.size as usize) < HEADER_SIZE {
            return Err(Error::InvalidStream(format!(
                "record {} declares {} bytes, less than its header",
                identity, header.size
            )));
        }
        Ok(header)
    }

    /// End of a record's subtree: store, patch or verify its size
    fn end_record(&mut self, identity: Identity) -> Result<()> {
        let entry = self.table.entry_mut(identity).ok_or_else(|| {
            Error::InvalidGraph(format!("finish unit for unknown record {}", identity))
        })?;
        let actual = self.cursor - entry.offset;

        match self.pass {
            Pass::Simulate => entry.size = actual,
            Pass::Emit => {
                let expected = self.simulation
                    .as_ref()
                    .and_then(|simulation| simulation.sizes.get(identity as usize).copied())
                    .unwrap_or(0);
                if actual != expected {
                    return Err(Error::SizeMismatch { identity, expected, actual });
                }
                let field = entry.offset + HEADER_SIZE_FIELD;
                self.output[field..field + WORD_SIZE].copy_from_slice(&(actual as u32).to_le_bytes());
                entry.size = actual;
            }
            Pass::Load => {
                if actual != entry.size {
                    return Err(Error::SizeMismatch { identity, expected: entry.size, actual });
                }
            }
            Pass::Resolve => {}
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "serializer_tests.rs"]
mod tests;
