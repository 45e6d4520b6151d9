/// Record - the serializable unit of an object graph.
///
/// A record is any polymorphic value that reports a stable type tag and lists
/// its fields through `describe_fields`. The same method drives every pass
/// (simulate, emit, load, resolve), so it must issue the same visitor calls
/// in the same order each time it runs.

use std::any::Any;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use crate::error::{Error, Result};
use crate::registry::TypeTag;
use crate::serializer::Serializer;

/// Shared handle to a record (owning edge).
pub type RecordRef = Arc<Mutex<dyn Record>>;

/// Non-owning handle to a record (reference edge).
pub type RecordWeak = Weak<Mutex<dyn Record>>;

/// Upcast helper giving `dyn Record` access to `Any` downcasting.
pub trait AsAny: Any {
    /// Borrow as `&dyn Any`
    fn as_any(&self) -> &dyn Any;

    /// Borrow as `&mut dyn Any`
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A serializable polymorphic value.
///
/// # Example
///
/// ```
/// use galaxy_3d_serializer::galaxy3d::Result;
/// use galaxy_3d_serializer::galaxy3d::record::{Record, RecordRef};
/// use galaxy_3d_serializer::galaxy3d::registry::TypeTag;
/// use galaxy_3d_serializer::galaxy3d::serializer::Serializer;
///
/// #[derive(Default)]
/// struct Light {
///     intensity: f32,
///     shadow_caster: Option<RecordRef>,
/// }
///
/// impl Record for Light {
///     fn type_tag(&self) -> TypeTag {
///         TypeTag(0x100)
///     }
///
///     fn describe_fields(&mut self, s: &mut Serializer<'_>) -> Result<()> {
///         s.data(&mut self.intensity)?;
///         s.owned_pointer(&mut self.shadow_caster)
///     }
/// }
/// ```
pub trait Record: AsAny + Send {
    /// Runtime type tag of the concrete type (not of the declared field type)
    fn type_tag(&self) -> TypeTag;

    /// Layout version written in the record header
    fn version(&self) -> u32 {
        0
    }

    /// Visit every field, in a fixed order, against the active pass
    fn describe_fields(&mut self, serializer: &mut Serializer<'_>) -> Result<()>;

    /// Called once per record after a load has resolved every reference
    fn after_load(&mut self) {}
}

impl dyn Record {
    /// Whether the concrete type is `T`
    pub fn is<T: Record>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// Downcast to the concrete type
    pub fn downcast_ref<T: Record>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Mutably downcast to the concrete type
    pub fn downcast_mut<T: Record>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// Wrap a record into a shared handle
pub fn new_record<T: Record>(record: T) -> RecordRef {
    Arc::new(Mutex::new(record))
}

/// Create a reference-edge handle to a record
pub fn downgrade(record: &RecordRef) -> RecordWeak {
    Arc::downgrade(record)
}

/// Address of the record behind a handle, used as identity key during save.
pub(crate) fn record_key(ptr: *const Mutex<dyn Record>) -> usize {
    ptr as *const () as usize
}

/// Lock a record, waiting for other threads that hold it.
///
/// The serializer holds at most the current record while locking a child,
/// and rejects a child that is the current record before locking it.
pub(crate) fn lock_record(record: &RecordRef) -> Result<MutexGuard<'_, dyn Record>> {
    record
        .lock()
        .map_err(|_| Error::LockPoisoned("record mutex".to_string()))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
