//! Cache Module
//!
//! Storage engine for a caching layer: key encoding, value persistence,
//! reference indexing, invalidation and TTL handling over a document store.

mod codec;
mod engine;
pub mod expiration;
mod invalidation;
pub mod references;
mod values;


// Re-export public types
pub use codec::{sha256_hex, KeyCodec};
pub use engine::{CacheStorage, DocumentCache, DocumentCacheBuilder};
pub use invalidation::{Invalidation, InvalidationEngine};
pub use references::ReferenceIndex;
pub use values::ValueStore;
