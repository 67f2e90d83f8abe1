//! Backend Capability Module
//!
//! The minimal set of primitives a document store must offer to host the
//! value store and the reference index.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;

use crate::error::Result;
use crate::store::Document;

// == Document Backend ==
/// Backing store primitives.
///
/// Implementations are shared across tasks, so every method takes `&self`
/// and must be safe to call concurrently on independent ids.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    /// Reads a document by id, expired or not.
    async fn find_by_id(&self, id: &str) -> Result<Option<Document>>;

    /// Full-document upsert: whatever was stored under the id is replaced.
    async fn replace(&self, document: Document) -> Result<()>;

    /// Atomic set-append upsert on a reference document.
    ///
    /// Creates the document with `created_at = now` when absent, adds
    /// `member` to its key set, and overwrites `expireAt` only when
    /// `expire_at` is `Some`.
    async fn add_to_set(
        &self,
        id: &str,
        member: &str,
        now: DateTime<Utc>,
        expire_at: Option<DateTime<Utc>>,
    ) -> Result<()>;

    /// Returns every document whose id matches `pattern`.
    async fn find_by_id_pattern(&self, pattern: &Regex) -> Result<Vec<Document>>;

    /// Deletes every listed id, ignoring missing ones. Returns how many went.
    async fn delete_many(&self, ids: &[String]) -> Result<u64>;

    /// Sets or clears the expiry of a document without touching its body.
    ///
    /// Returns `false` if the document does not exist. Stores with an
    /// in-place update should override the read-then-replace default.
    async fn set_expiry(&self, id: &str, expire_at: Option<DateTime<Utc>>) -> Result<bool> {
        match self.find_by_id(id).await? {
            Some(mut document) => {
                document.set_expire_at(expire_at);
                self.replace(document).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Asks the store to start reaping documents past their `expireAt`.
    async fn ensure_ttl_index(&self) -> Result<()> {
        Ok(())
    }
}
