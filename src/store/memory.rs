//! In-Memory Backend Module
//!
//! A `DocumentBackend` over a shared HashMap. It mirrors a document
//! store closely enough to host the cache in tests and single-process
//! deployments, including a background reaper with sweep lag.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::Result;
use crate::store::{Document, DocumentBackend, ReferenceRecord};
use crate::tasks::spawn_reaper_task;

/// Shared document map, keyed by id.
pub type DocumentMap = Arc<RwLock<HashMap<String, Document>>>;

/// Owns the reaper task and aborts it when dropped, so the task never
/// outlives the last backend handle.
#[derive(Debug)]
struct ReaperGuard(JoinHandle<()>);

impl Drop for ReaperGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

// == Memory Backend ==
/// Thread-safe in-memory document collection.
///
/// Clones share the same documents and reaper. The reaper stops on
/// `shutdown()` or when the last clone is dropped.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    documents: DocumentMap,
    reaper: Arc<Mutex<Option<ReaperGuard>>>,
    reaper_interval: Duration,
}

impl MemoryBackend {
    // == Constructor ==
    /// Creates an empty backend whose reaper sweeps every `reaper_interval_secs`.
    pub fn new(reaper_interval_secs: u64) -> Self {
        Self {
            documents: Arc::new(RwLock::new(HashMap::new())),
            reaper: Arc::new(Mutex::new(None)),
            reaper_interval: Duration::from_secs(reaper_interval_secs),
        }
    }

    /// Creates a backend using the reaper interval from configuration.
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self::new(config.reaper_interval)
    }

    // == Purge Expired ==
    /// Runs one reaper sweep now. Returns the number of documents removed.
    pub async fn purge_expired(&self) -> usize {
        purge_expired(&self.documents, Utc::now()).await
    }

    // == Shutdown ==
    /// Stops the reaper task if one is running.
    pub async fn shutdown(&self) {
        if let Some(guard) = self.reaper.lock().await.take() {
            drop(guard);
            debug!("Reaper task aborted");
        }
    }

    /// Whether the reaper task has been started and is still alive.
    pub async fn reaper_running(&self) -> bool {
        self.reaper
            .lock()
            .await
            .as_ref()
            .is_some_and(|guard| !guard.0.is_finished())
    }

    // == Length ==
    /// Returns the number of physically stored documents.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    // == Is Empty ==
    /// Returns true if no documents are stored.
    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::from_config(&crate::config::Config::default())
    }
}

fn empty_reference(id: &str, now: DateTime<Utc>) -> Document {
    Document::Reference(ReferenceRecord {
        id: id.to_string(),
        keys: BTreeSet::new(),
        created_at: now,
        expire_at: None,
    })
}

/// Removes every document whose expiry is at or before `now`.
pub async fn purge_expired(documents: &DocumentMap, now: DateTime<Utc>) -> usize {
    let mut guard = documents.write().await;
    let before = guard.len();
    guard.retain(|_, document| !document.is_expired_at(now));
    before - guard.len()
}

#[async_trait]
impl DocumentBackend for MemoryBackend {
    async fn find_by_id(&self, id: &str) -> Result<Option<Document>> {
        Ok(self.documents.read().await.get(id).cloned())
    }

    async fn replace(&self, document: Document) -> Result<()> {
        self.documents
            .write()
            .await
            .insert(document.id().to_string(), document);
        Ok(())
    }

    async fn add_to_set(
        &self,
        id: &str,
        member: &str,
        now: DateTime<Utc>,
        expire_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut guard = self.documents.write().await;
        let document = guard
            .entry(id.to_string())
            .or_insert_with(|| empty_reference(id, now));

        // A value document can never sit under a reference id while the
        // prefixes are disjoint; replace it rather than mixing families.
        if !matches!(document, Document::Reference(_)) {
            *document = empty_reference(id, now);
        }

        if let Document::Reference(record) = document {
            record.keys.insert(member.to_string());
            if expire_at.is_some() {
                record.expire_at = expire_at;
            }
        }
        Ok(())
    }

    async fn find_by_id_pattern(&self, pattern: &Regex) -> Result<Vec<Document>> {
        Ok(self
            .documents
            .read()
            .await
            .values()
            .filter(|document| pattern.is_match(document.id()))
            .cloned()
            .collect())
    }

    async fn delete_many(&self, ids: &[String]) -> Result<u64> {
        let mut guard = self.documents.write().await;
        let removed = ids.iter().filter(|id| guard.remove(*id).is_some()).count();
        Ok(removed as u64)
    }

    async fn set_expiry(&self, id: &str, expire_at: Option<DateTime<Utc>>) -> Result<bool> {
        match self.documents.write().await.get_mut(id) {
            Some(document) => {
                document.set_expire_at(expire_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ensure_ttl_index(&self) -> Result<()> {
        let mut reaper = self.reaper.lock().await;
        if reaper.as_ref().is_some_and(|guard| !guard.0.is_finished()) {
            return Ok(());
        }
        *reaper = Some(ReaperGuard(spawn_reaper_task(
            self.documents.clone(),
            self.reaper_interval,
        )));
        Ok(())
    }
}
