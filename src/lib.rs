//! refcache - Document-store cache backend
//!
//! Persists cache entries and reference indices in a document store, with
//! relative TTL expiry and reference-driven bulk invalidation (including
//! `*` wildcards over reference names).

pub mod cache;
pub mod config;
pub mod error;
pub mod store;
pub mod tasks;

pub use cache::{CacheStorage, DocumentCache, Invalidation};
pub use config::Config;
pub use error::{CacheError, Result};
pub use store::{DocumentBackend, MemoryBackend};
