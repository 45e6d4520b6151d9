/// Save pass - simulate, then emit.
///
/// Run 1 (simulate) walks the graph without writing: it assigns identities,
/// measures every record subtree and the total buffer size, and checks that
/// every reference target is reached by an owning edge. Run 2 (emit) repeats
/// the identical walk into a buffer allocated at the measured size, writing
/// reference identities from run 1 and patching size placeholders.

use std::mem;
use rustc_hash::FxHashMap;
use crate::error::{Error, Result};
use crate::record::RecordRef;
use crate::registry::TypeTag;
use crate::{engine_debug, engine_error};
use super::serializer::{Serializer, Pass, WorkUnit};
use super::stream::Identity;

/// Outcome of the simulate run, consumed by the emit run
pub(super) struct Simulation {
    /// Record address → identity
    pub(super) owners: FxHashMap<usize, Identity>,
    /// Subtree size per identity
    pub(super) sizes: Vec<usize>,
    /// Required buffer size, signature included
    pub(super) total: usize,
}

impl<'a> Serializer<'a> {
    /// Serialize the graph owned by `root` into a new buffer
    ///
    /// # Errors
    ///
    /// - `UnknownType` if a reachable record's type isn't registered
    /// - `DanglingReference` if a reference target has no owning path
    /// - `DuplicateOwnership` if a record is owned twice (or owns an ancestor)
    /// - `SizeMismatch` if a record describes different fields across runs
    pub fn save(&mut self, root: &RecordRef) -> Result<Vec<u8>> {
        let result = self.simulate(root).and_then(|simulation| self.emit(root, simulation));
        let records = self.table.len();
        self.reset(Pass::Simulate);

        match &result {
            Ok(bytes) => engine_debug!("galaxy3d::Serializer", "Saved {} records ({} bytes)", records, bytes.len()),
            Err(error) => engine_error!("galaxy3d::Serializer", "Save failed: {}", error),
        }
        result
    }

    /// Required buffer size for `root`, computed by the simulate run alone
    pub fn measure(&mut self, root: &RecordRef) -> Result<usize> {
        let result = self.simulate(root).map(|simulation| simulation.total);
        self.reset(Pass::Simulate);

        if let Err(error) = &result {
            engine_error!("galaxy3d::Serializer", "Measure failed: {}", error);
        }
        result
    }

    /// Run 1: identities, subtree sizes and total size
    fn simulate(&mut self, root: &RecordRef) -> Result<Simulation> {
        self.reset(Pass::Simulate);
        self.put_u32(TypeTag::SIGNATURE.0);
        self.work.push(WorkUnit::Start(root.clone()));
        self.drain()?;
        self.check_references()?;

        if self.cursor > u32::MAX as usize {
            return Err(Error::LimitExceeded(format!(
                "{} bytes exceed the 32-bit record size field",
                self.cursor
            )));
        }

        Ok(Simulation {
            owners: mem::take(&mut self.owners),
            sizes: self.table.iter().map(|(_, entry)| entry.size).collect(),
            total: self.cursor,
        })
    }

    /// Run 2: write into a buffer of exactly `simulation.total` bytes
    fn emit(&mut self, root: &RecordRef, simulation: Simulation) -> Result<Vec<u8>> {
        let total = simulation.total;
        self.reset(Pass::Emit);
        self.output = Vec::with_capacity(total);
        self.simulation = Some(simulation);

        self.put_u32(TypeTag::SIGNATURE.0);
        self.work.push(WorkUnit::Start(root.clone()));
        self.drain()?;

        if self.output.len() != total {
            return Err(Error::SizeMismatch {
                identity: 0,
                expected: total,
                actual: self.output.len(),
            });
        }
        Ok(mem::take(&mut self.output))
    }

    /// Every reference seen during simulate must target an owned record
    fn check_references(&self) -> Result<()> {
        for reference in &self.pending {
            if !reference.alive || !self.owners.contains_key(&reference.key) {
                return Err(Error::DanglingReference { referrer: reference.referrer });
            }
        }
        Ok(())
    }
}
