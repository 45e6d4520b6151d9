//! Serializer module
//!
//! The save and load passes over a record graph, the field visitor contract
//! they expose to `Record::describe_fields`, and the binary stream layout.
//!
//! # Stream layout
//!
//! Every framing integer is a little-endian `u32`.
//!
//! ```text
//! Stream   := Signature Record
//! Record   := TypeTag Version Identity ByteSize FieldData Record*
//! ```
//!
//! `ByteSize` spans the header and the whole owned subtree of the record.
//! Owned children follow their parent's field data in field order.

mod config;
mod stream;
mod identity_table;
mod serializer;
mod visitor;
mod save_pass;
mod load_pass;

pub use config::Config;
pub use stream::{RecordHeader, Identity, NULL_IDENTITY, HEADER_SIZE, is_package, peek_root};
pub use identity_table::{IdentityTable, IdentityEntry};
pub use serializer::{Serializer, Pass};
pub use load_pass::LoadedGraph;
