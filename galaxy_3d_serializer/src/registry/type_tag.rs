/// Type tags and type metadata flags.

use std::fmt;
use bitflags::bitflags;

/// Stable on-disk identifier of a record type.
///
/// Tags are chosen by the record author and must never change once assets
/// have been exported with them. Two values are reserved by the stream
/// format and can't be registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeTag(pub u32);

impl TypeTag {
    /// Written in place of an owned pointer that is `None`
    pub const NULL: TypeTag = TypeTag(0);

    /// Leading token of every package ("G3PK" read as little-endian bytes)
    pub const SIGNATURE: TypeTag = TypeTag(0x4B50_3347);

    /// Whether the stream format reserves this tag
    pub fn is_reserved(self) -> bool {
        self == Self::NULL || self == Self::SIGNATURE
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

bitflags! {
    /// Metadata flags stored in a type descriptor.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TypeFlags: u32 {
        /// At least one registered type names this type as its base
        const POLYMORPHIC_BASE = 1 << 0;
        /// The type was registered with a base type
        const SUBTYPE = 1 << 1;
    }
}
