//! Record module
//!
//! The record trait and the shared/weak handles that form owning and
//! reference edges of a serializable object graph.

mod record;

pub use record::{Record, RecordRef, RecordWeak, AsAny, new_record, downgrade};
pub(crate) use record::{record_key, lock_record};
