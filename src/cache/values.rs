//! Value Store Module
//!
//! Persists opaque payloads under encoded value ids. Reads never fail:
//! a missing, expired or unreadable record is a miss.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::{expiration, KeyCodec, ReferenceIndex};
use crate::error::Result;
use crate::store::{Document, DocumentBackend, ValueRecord};

// == Value Store ==
/// Value records stored through a `DocumentBackend`.
#[derive(Clone)]
pub struct ValueStore {
    backend: Arc<dyn DocumentBackend>,
    codec: KeyCodec,
    references: ReferenceIndex,
}

impl ValueStore {
    // == Constructor ==
    pub fn new(backend: Arc<dyn DocumentBackend>, codec: KeyCodec, references: ReferenceIndex) -> Self {
        Self {
            backend,
            codec,
            references,
        }
    }

    /// Fetches the stored record, logging and swallowing backend failures.
    async fn read(&self, raw_key: &str) -> Option<ValueRecord> {
        match self.backend.find_by_id(&self.codec.value_id(raw_key)).await {
            Ok(document) => document.and_then(Document::into_value),
            Err(err) => {
                warn!(key = %raw_key, error = %err, "Cache read failed, treating as miss");
                None
            }
        }
    }

    // == Get ==
    /// Returns the payload stored under `raw_key`.
    ///
    /// A record past its expiry is a miss even if the reaper has not
    /// deleted it yet.
    pub async fn get(&self, raw_key: &str) -> Option<Value> {
        let record = self.read(raw_key).await?;
        if expiration::is_expired(record.expire_at, Utc::now()) {
            debug!(key = %raw_key, "Cache entry logically expired");
            return None;
        }
        Some(record.value)
    }

    // == Set ==
    /// Stores `value` under `raw_key`, replacing any previous record.
    ///
    /// `ttl_seconds <= 0` stores the record without an expiry. Once the
    /// value is written, `raw_key` is added to each reference's index;
    /// indexing failures are logged and do not undo the write.
    ///
    /// # Errors
    /// Returns the backend error if the value itself could not be written.
    pub async fn set(
        &self,
        raw_key: &str,
        value: Value,
        ttl_seconds: i64,
        references: &[&str],
    ) -> Result<()> {
        let now = Utc::now();
        let record = ValueRecord {
            id: self.codec.value_id(raw_key),
            value,
            created_at: now,
            expire_at: expiration::expire_at(ttl_seconds, now),
        };
        self.backend.replace(Document::Value(record)).await?;

        if !references.is_empty() {
            let failed = self.references.add_keys(references, raw_key, ttl_seconds).await;
            if failed > 0 {
                warn!(
                    key = %raw_key,
                    failed,
                    total = references.len(),
                    "Value stored with an incomplete reference index"
                );
            }
        }
        Ok(())
    }

    // == Remove ==
    /// Deletes the record for `raw_key`. Missing keys are not an error.
    pub async fn remove(&self, raw_key: &str) -> Result<()> {
        self.backend
            .delete_many(&[self.codec.value_id(raw_key)])
            .await?;
        Ok(())
    }

    /// Deletes the records for every raw key. Returns how many existed.
    pub async fn remove_many<'a, I>(&self, raw_keys: I) -> Result<u64>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let ids: Vec<String> = raw_keys
            .into_iter()
            .map(|key| self.codec.value_id(key))
            .collect();
        if ids.is_empty() {
            return Ok(0);
        }
        self.backend.delete_many(&ids).await
    }

    // == Refresh ==
    /// Resets the expiry of `raw_key` without touching its payload.
    ///
    /// `ttl_seconds <= 0` removes the expiry. Absent keys are left alone.
    pub async fn refresh(&self, raw_key: &str, ttl_seconds: i64) -> Result<()> {
        let expire_at = expiration::expire_at(ttl_seconds, Utc::now());
        let found = self
            .backend
            .set_expiry(&self.codec.value_id(raw_key), expire_at)
            .await?;
        if !found {
            debug!(key = %raw_key, "Refresh skipped, key absent");
        }
        Ok(())
    }

    // == Get TTL ==
    /// Remaining whole seconds before `raw_key` expires.
    ///
    /// Returns 0 for absent keys and for keys stored without an expiry.
    pub async fn get_ttl(&self, raw_key: &str) -> u64 {
        self.read(raw_key)
            .await
            .map(|record| expiration::remaining_seconds(record.expire_at, Utc::now()))
            .unwrap_or(0)
    }

    // == Exists ==
    /// Whether a record for `raw_key` is physically present.
    ///
    /// Expiry is not compared here, so a record awaiting the reaper still
    /// counts.
    pub async fn exists(&self, raw_key: &str) -> bool {
        self.read(raw_key).await.is_some()
    }
}
