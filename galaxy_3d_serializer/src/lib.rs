/*!
# Galaxy 3D Serializer

Binary object-graph serialization for the Galaxy 3D engine.

Scene graphs, meshes, materials and animation data are polymorphic records
that own sub-records and point at each other. This crate writes such a graph
into one compact little-endian byte stream and rebuilds an equivalent graph
from it, restoring sharing and cycles.

## Architecture

- **Record**: trait implemented by every serializable type; a single
  `describe_fields` drives every pass
- **TypeRegistry**: stable type tag → blank-record factory, with subtype links
- **Serializer**: two-run save (simulate, emit) and load with deferred
  reference resolution
- **Engine**: process-wide registry and logger singletons

Owning edges are `Arc` handles, reference edges `Weak` handles. Records
reached by an owning edge receive a sequential identity; references are
stored as identities and substituted after every record has been loaded.
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod record;
pub mod registry;
pub mod serializer;

// Main galaxy3d namespace module
pub mod galaxy3d {
    // Error types
    pub use crate::error::{Error, Result};

    // Engine singleton
    pub use crate::engine::Engine;

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
    }

    // Record trait and handles
    pub mod record {
        pub use crate::record::*;
    }

    // Type registry sub-module
    pub mod registry {
        pub use crate::registry::*;
    }

    // Save / load passes and stream inspection
    pub mod serializer {
        pub use crate::serializer::*;
    }
}

// Re-export the plain-old-data library used by `Serializer::data`
pub use bytemuck;
