/// Load pass - read records, then resolve references.
///
/// Records are constructed blank from the type tag of their header and
/// filled by `describe_fields`. Reference fields only queue the identity
/// they store; once every record exists, a resolve pass walks the records
/// again in identity order and substitutes each queued identity with the
/// live record.

use std::fmt;
use std::mem;
use crate::error::{Error, Result};
use crate::record::{RecordRef, lock_record};
use crate::registry::TypeTag;
use crate::{engine_debug, engine_error, engine_warn};
use super::identity_table::IdentityTable;
use super::serializer::{Serializer, Pass, WorkUnit};
use super::stream::{read_u32_at, SIGNATURE_SIZE};

/// Result of a successful load.
pub struct LoadedGraph {
    /// Root record (identity 0)
    pub root: RecordRef,
    /// Every loaded record, by identity
    pub identities: IdentityTable,
}

impl fmt::Debug for LoadedGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedGraph")
            .field("records", &self.identities.len())
            .finish_non_exhaustive()
    }
}

impl<'a> Serializer<'a> {
    /// Rebuild the graph stored in `bytes`
    ///
    /// # Errors
    ///
    /// - `InvalidSignature` if the blob is not a package
    /// - `UnknownType` if a stored type tag isn't registered
    /// - `TruncatedStream` if a record reads past the end of the blob
    /// - `SizeMismatch` if a record consumes a different byte count than its header declares
    /// - `BrokenReference` if a stored identity is out of range
    /// - `InvalidStream` for trailing bytes (unless allowed) or malformed framing
    pub fn load(&mut self, bytes: &'a [u8]) -> Result<LoadedGraph> {
        let result = self.load_graph(bytes);
        self.reset(Pass::Load);

        match &result {
            Ok(graph) => engine_debug!("galaxy3d::Serializer", "Loaded {} records ({} bytes)", graph.identities.len(), bytes.len()),
            Err(error) => engine_error!("galaxy3d::Serializer", "Load failed: {}", error),
        }
        result
    }

    fn load_graph(&mut self, bytes: &'a [u8]) -> Result<LoadedGraph> {
        self.reset(Pass::Load);
        self.input = bytes;

        let signature = self.take_u32()?;
        if signature != TypeTag::SIGNATURE.0 {
            return Err(Error::InvalidSignature(signature));
        }

        // The root is the only record not constructed by an owning field
        let root_tag = read_u32_at(bytes, SIGNATURE_SIZE).ok_or(Error::TruncatedStream {
            offset: SIGNATURE_SIZE,
            requested: SIGNATURE_SIZE,
            available: bytes.len() - SIGNATURE_SIZE,
        })?;
        let root = self.registry.construct(TypeTag(root_tag))?;

        self.work.push(WorkUnit::Start(root.clone()));
        self.drain()?;

        let trailing = bytes.len() - self.cursor;
        if trailing > 0 {
            if !self.config.allow_trailing_bytes {
                return Err(Error::InvalidStream(format!(
                    "{} trailing bytes after the root record",
                    trailing
                )));
            }
            engine_warn!("galaxy3d::Serializer", "Ignoring {} trailing bytes after the root record", trailing);
        }

        if !self.deferred.is_empty() {
            self.resolve_references()?;
        }
        self.notify_loaded()?;

        Ok(LoadedGraph {
            root,
            identities: mem::take(&mut self.table),
        })
    }

    /// Substitute queued identities, walking records in identity order
    fn resolve_references(&mut self) -> Result<()> {
        self.pass = Pass::Resolve;

        for identity in 0..self.table.len() {
            let (record, version) = match self.table.get(identity as u32) {
                Some(entry) => (entry.record.clone(), entry.version),
                None => break,
            };
            self.current = identity as u32;
            self.current_version = version;
            lock_record(&record)?.describe_fields(self)?;
        }

        if !self.deferred.is_empty() {
            return Err(Error::InvalidStream(format!(
                "{} reference fields left unresolved",
                self.deferred.len()
            )));
        }
        Ok(())
    }

    fn notify_loaded(&self) -> Result<()> {
        for (_, entry) in self.table.iter() {
            lock_record(&entry.record)?.after_load();
        }
        Ok(())
    }
}
