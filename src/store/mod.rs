//! Store Module
//!
//! Backing-store capabilities and the records persisted through them.
//! Value and reference records share one keyed collection and are told
//! apart by their id prefix.

mod backend;
pub mod memory;
mod record;

pub use backend::DocumentBackend;
pub use memory::MemoryBackend;
pub use record::{Document, ReferenceRecord, ValueRecord};
