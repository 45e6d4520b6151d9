//! Type registry module
//!
//! Maps stable type tags to the descriptors used to construct blank records
//! on load.

mod type_tag;
mod type_registry;

pub use type_tag::{TypeTag, TypeFlags};
pub use type_registry::{TypeRegistry, TypeDescriptor, RecordFactory};
