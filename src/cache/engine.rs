//! Document Cache Module
//!
//! The storage engine handed to a caching layer: wires the codec, value
//! store, reference index and invalidation flows over one backend, and
//! exposes them through the `CacheStorage` contract.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use crate::cache::{Invalidation, InvalidationEngine, KeyCodec, ReferenceIndex, ValueStore};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::store::DocumentBackend;

// == Cache Storage Contract ==
/// Operations a caching layer needs from its storage engine.
///
/// `refresh`, `get_ttl` and `exists` are optional; their provided bodies
/// describe a storage that cannot introspect expiry.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Payload stored under `key`, or `None` on miss or read failure.
    async fn get(&self, key: &str) -> Option<Value>;

    /// Stores `value` under `key`, tagging it with `references`.
    async fn set(&self, key: &str, value: Value, ttl_seconds: i64, references: &[&str])
        -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;

    /// Invalidates every listed reference or wildcard pattern in turn.
    async fn invalidate(&self, references: &[&str]) -> Result<()>;

    async fn clear(&self) -> Result<()>;

    async fn refresh(&self, _key: &str, _ttl_seconds: i64) -> Result<()> {
        Ok(())
    }

    async fn get_ttl(&self, _key: &str) -> u64 {
        0
    }

    async fn exists(&self, key: &str) -> bool {
        self.get(key).await.is_some()
    }
}

// == Document Cache ==
/// Cache storage engine over a `DocumentBackend`.
#[derive(Clone)]
pub struct DocumentCache {
    backend: Arc<dyn DocumentBackend>,
    values: ValueStore,
    references: ReferenceIndex,
    invalidation: InvalidationEngine,
    config: Config,
}

impl DocumentCache {
    /// Starts building a cache; a backend must be supplied before `build`.
    pub fn builder() -> DocumentCacheBuilder {
        DocumentCacheBuilder::default()
    }

    // == Connect ==
    /// Builds a cache and asks the backend to start reaping expired records.
    ///
    /// A backend that cannot create its TTL index still yields a working
    /// cache; expired records are then only hidden, never deleted.
    pub async fn connect(backend: Arc<dyn DocumentBackend>, config: Config) -> Result<Self> {
        let cache = Self::builder().backend(backend).config(config).build()?;
        match cache.backend.ensure_ttl_index().await {
            Ok(()) => info!("Document cache ready"),
            Err(err) => warn!(error = %err, "TTL index unavailable, expired records will linger"),
        }
        Ok(cache)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn values(&self) -> &ValueStore {
        &self.values
    }

    pub fn references(&self) -> &ReferenceIndex {
        &self.references
    }

    pub fn invalidation(&self) -> &InvalidationEngine {
        &self.invalidation
    }

    // == Get ==
    pub async fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).await
    }

    // == Set ==
    pub async fn set(
        &self,
        key: &str,
        value: Value,
        ttl_seconds: i64,
        references: &[&str],
    ) -> Result<()> {
        self.values.set(key, value, ttl_seconds, references).await
    }

    // == Remove ==
    pub async fn remove(&self, key: &str) -> Result<()> {
        self.values.remove(key).await
    }

    // == Invalidate ==
    /// Invalidates one reference, or a family of them if it contains `*`.
    pub async fn invalidate(&self, reference: &str) -> Result<Invalidation> {
        self.invalidation.invalidate(reference).await
    }

    /// Invalidates each listed reference independently.
    pub async fn invalidate_many(&self, references: &[&str]) -> Result<Invalidation> {
        self.invalidation.invalidate_many(references).await
    }

    // == Clear ==
    pub async fn clear(&self) -> Result<Invalidation> {
        self.invalidation.clear().await
    }

    // == Introspection ==
    pub async fn refresh(&self, key: &str, ttl_seconds: i64) -> Result<()> {
        self.values.refresh(key, ttl_seconds).await
    }

    pub async fn get_ttl(&self, key: &str) -> u64 {
        self.values.get_ttl(key).await
    }

    pub async fn exists(&self, key: &str) -> bool {
        self.values.exists(key).await
    }
}

#[async_trait]
impl CacheStorage for DocumentCache {
    async fn get(&self, key: &str) -> Option<Value> {
        DocumentCache::get(self, key).await
    }

    async fn set(
        &self,
        key: &str,
        value: Value,
        ttl_seconds: i64,
        references: &[&str],
    ) -> Result<()> {
        DocumentCache::set(self, key, value, ttl_seconds, references).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        DocumentCache::remove(self, key).await
    }

    async fn invalidate(&self, references: &[&str]) -> Result<()> {
        self.invalidate_many(references).await.map(|_| ())
    }

    async fn clear(&self) -> Result<()> {
        DocumentCache::clear(self).await.map(|_| ())
    }

    async fn refresh(&self, key: &str, ttl_seconds: i64) -> Result<()> {
        DocumentCache::refresh(self, key, ttl_seconds).await
    }

    async fn get_ttl(&self, key: &str) -> u64 {
        DocumentCache::get_ttl(self, key).await
    }

    async fn exists(&self, key: &str) -> bool {
        DocumentCache::exists(self, key).await
    }
}

// == Builder ==
/// Collects the pieces of a `DocumentCache`.
#[derive(Default)]
pub struct DocumentCacheBuilder {
    backend: Option<Arc<dyn DocumentBackend>>,
    config: Option<Config>,
}

impl DocumentCacheBuilder {
    pub fn backend(mut self, backend: Arc<dyn DocumentBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Assembles the cache.
    ///
    /// # Errors
    /// `CacheError::Configuration` if no backend was supplied or the
    /// namespace prefixes overlap.
    pub fn build(self) -> Result<DocumentCache> {
        let backend = self.backend.ok_or_else(|| {
            CacheError::Configuration("a document backend is required".to_string())
        })?;
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let codec = KeyCodec::from_config(&config);
        let references =
            ReferenceIndex::new(backend.clone(), codec.clone(), config.full_anchor_wildcards);
        let values = ValueStore::new(backend.clone(), codec.clone(), references.clone());
        let invalidation =
            InvalidationEngine::new(backend.clone(), codec, values.clone(), references.clone());

        Ok(DocumentCache {
            backend,
            values,
            references,
            invalidation,
            config,
        })
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBackend;
    use serde_json::json;

    #[test]
    fn test_build_without_backend_fails() {
        let result = DocumentCache::builder().build();
        assert!(matches!(result, Err(CacheError::Configuration(_))));
    }

    #[test]
    fn test_build_rejects_overlapping_prefixes() {
        let config = Config {
            value_prefix: "c:".to_string(),
            reference_prefix: "c:".to_string(),
            ..Config::default()
        };
        let result = DocumentCache::builder()
            .backend(Arc::new(MemoryBackend::default()))
            .config(config)
            .build();
        assert!(matches!(result, Err(CacheError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_connect_starts_reaper() {
        let backend = MemoryBackend::new(60);
        let cache = DocumentCache::connect(Arc::new(backend.clone()), Config::default())
            .await
            .unwrap();

        assert!(backend.reaper_running().await);
        assert_eq!(cache.config().value_prefix, "value:");
        backend.shutdown().await;
    }

    #[tokio::test]
    async fn test_custom_prefixes_flow_through() {
        let backend = MemoryBackend::new(60);
        let config = Config {
            value_prefix: "v/".to_string(),
            reference_prefix: "r/".to_string(),
            ..Config::default()
        };
        let cache = DocumentCache::builder()
            .backend(Arc::new(backend.clone()))
            .config(config)
            .build()
            .unwrap();

        cache.set("k", json!("v"), 0, &["tag"]).await.unwrap();
        assert!(backend.find_by_id("v/k").await.unwrap().is_some());
        assert!(backend.find_by_id("r/tag").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_storage_trait_object() {
        let cache = DocumentCache::builder()
            .backend(Arc::new(MemoryBackend::default()))
            .build()
            .unwrap();
        let storage: Arc<dyn CacheStorage> = Arc::new(cache);

        storage.set("k", json!([1, 2]), 30, &["t:1"]).await.unwrap();
        assert!(storage.exists("k").await);
        assert!(storage.get_ttl("k").await <= 30);

        storage.invalidate(&["t:*"]).await.unwrap();
        assert!(storage.get("k").await.is_none());

        storage.remove("k").await.unwrap();
        storage.clear().await.unwrap();
    }
}
