/// Type registry - maps type tags to blank-record factories.
///
/// The registry is filled at startup, then shared read-only by every
/// serializer (directly, or through the `Engine` singleton once installed).
/// Lookups go through an `FxHashMap` keyed by tag.

use std::mem::size_of;
use std::sync::{Arc, Mutex};
use rustc_hash::FxHashMap;
use crate::error::{Error, Result};
use crate::{engine_err, engine_bail};
use crate::record::{Record, RecordRef};
use super::type_tag::{TypeTag, TypeFlags};

/// Factory creating a blank, default-constructed record
pub type RecordFactory = fn() -> RecordRef;

fn blank<T: Record + Default>() -> RecordRef {
    Arc::new(Mutex::new(T::default()))
}

// ============================================================================
// TYPE DESCRIPTOR
// ============================================================================

/// Registration data for one record type.
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    tag: TypeTag,
    name: &'static str,
    size: usize,
    base: Option<TypeTag>,
    flags: TypeFlags,
    factory: RecordFactory,
}

impl TypeDescriptor {
    /// Create a descriptor from an explicit factory
    ///
    /// # Arguments
    ///
    /// * `tag` - Stable on-disk tag
    /// * `name` - Human readable type name (diagnostics only)
    /// * `factory` - Creates a blank instance whose `type_tag()` is `tag`
    /// * `size` - In-memory size of the concrete type
    pub fn new(tag: TypeTag, name: &'static str, factory: RecordFactory, size: usize) -> Self {
        Self {
            tag,
            name,
            size,
            base: None,
            flags: TypeFlags::empty(),
            factory,
        }
    }

    /// Create a descriptor for a `Default` record type
    pub fn of<T: Record + Default>(tag: TypeTag, name: &'static str) -> Self {
        Self::new(tag, name, blank::<T>, size_of::<T>())
    }

    /// Declare the base type of this type
    pub fn with_base(mut self, base: TypeTag) -> Self {
        self.base = Some(base);
        self.flags |= TypeFlags::SUBTYPE;
        self
    }

    /// Stable on-disk tag
    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    /// Type name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// In-memory size of the concrete type
    pub fn size(&self) -> usize {
        self.size
    }

    /// Base type, if registered as a subtype
    pub fn base(&self) -> Option<TypeTag> {
        self.base
    }

    /// Metadata flags
    pub fn flags(&self) -> TypeFlags {
        self.flags
    }

    /// Whether some registered type derives from this one
    pub fn is_polymorphic_base(&self) -> bool {
        self.flags.contains(TypeFlags::POLYMORPHIC_BASE)
    }
}

// ============================================================================
// TYPE REGISTRY
// ============================================================================

/// Registry of every record type that may appear in a package.
///
/// # Example
///
/// ```ignore
/// let mut registry = TypeRegistry::new();
/// registry.register_type::<Material>(TypeTag(0x10), "Material")?;
/// registry.register_subtype::<PbrMaterial>(TypeTag(0x11), "PbrMaterial", TypeTag(0x10))?;
/// let blank = registry.construct(TypeTag(0x11))?;
/// ```
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: FxHashMap<TypeTag, TypeDescriptor>,
}

impl TypeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            types: FxHashMap::default(),
        }
    }

    /// Register a descriptor
    ///
    /// # Errors
    ///
    /// - `ReservedType` if the tag is reserved by the stream format
    /// - `DuplicateType` if the tag is already registered
    /// - `UnknownType` if the descriptor names a base that isn't registered
    /// - `TypeMismatch` if the factory builds a record reporting another tag
    pub fn register(&mut self, descriptor: TypeDescriptor) -> Result<()> {
        let tag = descriptor.tag;
        if tag.is_reserved() {
            engine_bail!("galaxy3d::TypeRegistry", Error::ReservedType(tag));
        }
        if self.types.contains_key(&tag) {
            engine_bail!("galaxy3d::TypeRegistry", Error::DuplicateType(tag));
        }

        let found = (descriptor.factory)()
            .lock()
            .map_err(|_| Error::LockPoisoned("blank record".to_string()))?
            .type_tag();
        if found != tag {
            engine_bail!("galaxy3d::TypeRegistry", Error::TypeMismatch { expected: tag, found });
        }

        if let Some(base) = descriptor.base {
            let base_descriptor = self.types.get_mut(&base)
                .ok_or_else(|| engine_err!("galaxy3d::TypeRegistry", Error::UnknownType(base)))?;
            base_descriptor.flags |= TypeFlags::POLYMORPHIC_BASE;
        }

        crate::engine_trace!("galaxy3d::TypeRegistry", "Registered {} as {}", descriptor.name, tag);
        self.types.insert(tag, descriptor);
        Ok(())
    }

    /// Register a `Default` record type
    pub fn register_type<T: Record + Default>(&mut self, tag: TypeTag, name: &'static str) -> Result<()> {
        self.register(TypeDescriptor::of::<T>(tag, name))
    }

    /// Register a `Default` record type deriving from an already registered base
    pub fn register_subtype<T: Record + Default>(
        &mut self,
        tag: TypeTag,
        name: &'static str,
        base: TypeTag,
    ) -> Result<()> {
        self.register(TypeDescriptor::of::<T>(tag, name).with_base(base))
    }

    /// Construct a blank instance of a registered type
    ///
    /// # Errors
    ///
    /// Returns `UnknownType` if the tag isn't registered.
    pub fn construct(&self, tag: TypeTag) -> Result<RecordRef> {
        self.types.get(&tag)
            .map(|descriptor| (descriptor.factory)())
            .ok_or(Error::UnknownType(tag))
    }

    /// Descriptor of a registered type
    pub fn descriptor(&self, tag: TypeTag) -> Option<&TypeDescriptor> {
        self.types.get(&tag)
    }

    /// Name of a registered type
    pub fn type_name(&self, tag: TypeTag) -> Option<&'static str> {
        self.types.get(&tag).map(|descriptor| descriptor.name)
    }

    /// Whether a tag is registered
    pub fn contains(&self, tag: TypeTag) -> bool {
        self.types.contains_key(&tag)
    }

    /// Whether `tag` is `base` or derives from it (directly or transitively)
    pub fn is_kind_of(&self, tag: TypeTag, base: TypeTag) -> bool {
        let mut current = Some(tag);
        while let Some(candidate) = current {
            if candidate == base {
                return true;
            }
            current = self.types.get(&candidate).and_then(|descriptor| descriptor.base);
        }
        false
    }

    /// Iterate over all registered descriptors (unordered)
    pub fn descriptors(&self) -> impl Iterator<Item = &TypeDescriptor> + '_ {
        self.types.values()
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether no type is registered
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "type_registry_tests.rs"]
mod tests;
