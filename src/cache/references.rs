//! Reference Index Module
//!
//! Reverse mapping from a reference to the raw keys tagged with it. One
//! reference record per reference name; a key tagged with several
//! references appears in several records.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use regex::Regex;
use tracing::warn;

use crate::cache::expiration;
use crate::cache::KeyCodec;
use crate::error::Result;
use crate::store::{Document, DocumentBackend};

/// Wildcard character accepted in reference patterns.
pub const WILDCARD: char = '*';

// == Reference Index ==
/// Reference records stored through a `DocumentBackend`.
#[derive(Clone)]
pub struct ReferenceIndex {
    backend: Arc<dyn DocumentBackend>,
    codec: KeyCodec,
    full_anchor: bool,
}

impl ReferenceIndex {
    // == Constructor ==
    /// # Arguments
    /// * `backend` - Shared backing store
    /// * `codec` - Codec producing reference ids
    /// * `full_anchor` - Require wildcard patterns to match whole ids
    pub fn new(backend: Arc<dyn DocumentBackend>, codec: KeyCodec, full_anchor: bool) -> Self {
        Self {
            backend,
            codec,
            full_anchor,
        }
    }

    /// Encoded id of a raw reference name.
    pub fn reference_id(&self, raw_reference: &str) -> String {
        self.codec.reference_id(raw_reference)
    }

    // == Add Key ==
    /// Tags `raw_key` with `raw_reference`.
    ///
    /// Repeated calls never duplicate the key. A positive TTL overwrites the
    /// record's expiry with this call's, whether it is sooner or later.
    pub async fn add_key(&self, raw_reference: &str, raw_key: &str, ttl_seconds: i64) -> Result<()> {
        let now = Utc::now();
        self.backend
            .add_to_set(
                &self.reference_id(raw_reference),
                raw_key,
                now,
                expiration::expire_at(ttl_seconds, now),
            )
            .await
    }

    // == Add Keys ==
    /// Tags `raw_key` with every reference, concurrently.
    ///
    /// Each reference succeeds or fails on its own; failures are logged.
    /// Returns the number of references that could not be written.
    pub async fn add_keys(&self, raw_references: &[&str], raw_key: &str, ttl_seconds: i64) -> usize {
        let results = join_all(
            raw_references
                .iter()
                .map(|reference| self.add_key(reference, raw_key, ttl_seconds)),
        )
        .await;

        let mut failed = 0;
        for (reference, result) in raw_references.iter().zip(results) {
            if let Err(err) = result {
                warn!(reference = %reference, key = %raw_key, error = %err, "Failed to index reference");
                failed += 1;
            }
        }
        failed
    }

    // == Lookup ==
    /// Raw keys tagged with `raw_reference`; empty if it was never used.
    pub async fn lookup(&self, raw_reference: &str) -> Result<BTreeSet<String>> {
        let document = self.backend.find_by_id(&self.reference_id(raw_reference)).await?;
        Ok(document
            .and_then(Document::into_reference)
            .map(|record| record.keys)
            .unwrap_or_default())
    }

    // == Lookup By Pattern ==
    /// Every stored reference whose id matches the wildcard `pattern`,
    /// mapped from reference id to its raw keys.
    pub async fn lookup_by_pattern(&self, pattern: &str) -> Result<BTreeMap<String, BTreeSet<String>>> {
        let matcher = self.pattern_matcher(pattern)?;
        let documents = self.backend.find_by_id_pattern(&matcher).await?;
        Ok(documents
            .into_iter()
            .filter_map(Document::into_reference)
            .map(|record| (record.id, record.keys))
            .collect())
    }

    // == Pattern Matcher ==
    /// Compiles a wildcard into a regex over reference ids.
    ///
    /// Everything except `*` matches literally and `*` matches any run of
    /// characters, newlines included. The match is anchored at the start of
    /// the id, and at the end too when full anchoring is configured.
    pub fn pattern_matcher(&self, pattern: &str) -> Result<Regex> {
        let body = pattern
            .split(WILDCARD)
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        let anchor = if self.full_anchor { "$" } else { "" };
        let source = format!(
            "(?s)^{}{}{}",
            regex::escape(self.codec.reference_prefix()),
            body,
            anchor
        );
        Ok(Regex::new(&source)?)
    }

    // == Delete ==
    /// Removes one reference record by encoded id.
    pub async fn delete_reference(&self, id: &str) -> Result<u64> {
        self.backend.delete_many(&[id.to_string()]).await
    }

    /// Removes several reference records by encoded id.
    pub async fn delete_references(&self, ids: &[String]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.backend.delete_many(ids).await
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBackend;

    fn index(full_anchor: bool) -> (ReferenceIndex, MemoryBackend) {
        let backend = MemoryBackend::new(60);
        let index = ReferenceIndex::new(Arc::new(backend.clone()), KeyCodec::default(), full_anchor);
        (index, backend)
    }

    #[tokio::test]
    async fn test_add_key_is_a_set_union() {
        let (index, _) = index(false);
        index.add_key("user:1", "a", 60).await.unwrap();
        index.add_key("user:1", "a", 60).await.unwrap();
        index.add_key("user:1", "b", 0).await.unwrap();

        let keys = index.lookup("user:1").await.unwrap();
        assert_eq!(keys, BTreeSet::from(["a".to_string(), "b".to_string()]));
    }

    #[tokio::test]
    async fn test_lookup_missing_reference_is_empty() {
        let (index, _) = index(false);
        assert!(index.lookup("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_keys_writes_every_reference() {
        let (index, backend) = index(false);
        let failed = index.add_keys(&["x:1", "x:2", "y:1"], "k", 60).await;

        assert_eq!(failed, 0);
        assert_eq!(backend.len().await, 3);
        assert!(index.lookup("y:1").await.unwrap().contains("k"));
    }

    #[tokio::test]
    async fn test_expiry_is_last_writer_wins() {
        let (index, backend) = index(false);
        index.add_key("r", "a", 3600).await.unwrap();
        index.add_key("r", "b", 5).await.unwrap();

        let doc = backend.find_by_id("ref:r").await.unwrap().unwrap();
        let remaining = expiration::remaining_seconds(doc.expire_at(), Utc::now());
        assert!(remaining <= 5);
    }

    #[test]
    fn test_pattern_escapes_metacharacters() {
        let (index, _) = index(false);
        let matcher = index.pattern_matcher("a.b+(c)*").unwrap();

        assert!(matcher.is_match("ref:a.b+(c)"));
        assert!(matcher.is_match("ref:a.b+(c)-anything"));
        assert!(!matcher.is_match("ref:aXb+(c)"));
        assert!(!matcher.is_match("value:a.b+(c)"));
    }

    #[test]
    fn test_pattern_start_anchor_only() {
        let (index, _) = index(false);
        let matcher = index.pattern_matcher("user:*:posts").unwrap();
        assert!(matcher.is_match("ref:user:1:posts"));
        assert!(matcher.is_match("ref:user:1:posts:draft"));
    }

    #[test]
    fn test_pattern_full_anchor() {
        let (index, _) = index(true);
        let matcher = index.pattern_matcher("user:*:posts").unwrap();
        assert!(matcher.is_match("ref:user:1:posts"));
        assert!(!matcher.is_match("ref:user:1:posts:draft"));
    }

    #[test]
    fn test_pattern_wildcard_spans_newlines() {
        let (index, _) = index(true);
        let matcher = index.pattern_matcher("a*end").unwrap();
        assert!(matcher.is_match("ref:a\nb:end"));
        assert!(matcher.is_match("ref:a\n\nend"));
    }

    #[tokio::test]
    async fn test_wildcard_lookup_finds_multiline_reference() {
        let (index, _) = index(false);
        index.add_key("a\nb:end", "k", 60).await.unwrap();

        let matched = index.lookup_by_pattern("a*end").await.unwrap();
        assert!(matched["ref:a\nb:end"].contains("k"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_add_key_loses_nothing() {
        let (index, _) = index(false);
        let tasks: Vec<_> = (0..200)
            .map(|i| {
                let index = index.clone();
                tokio::spawn(async move { index.add_key("same", &format!("k{i}"), 60).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let keys = index.lookup("same").await.unwrap();
        assert_eq!(keys.len(), 200);
        assert!((0..200).all(|i| keys.contains(&format!("k{i}"))));
    }

    #[tokio::test]
    async fn test_lookup_by_pattern_groups_by_reference() {
        let (index, _) = index(false);
        index.add_key("x:1", "a", 60).await.unwrap();
        index.add_key("x:2", "b", 60).await.unwrap();
        index.add_key("y:1", "c", 60).await.unwrap();

        let matched = index.lookup_by_pattern("x:*").await.unwrap();
        assert_eq!(matched.len(), 2);
        assert!(matched["ref:x:1"].contains("a"));
        assert!(matched["ref:x:2"].contains("b"));
    }

    #[tokio::test]
    async fn test_delete_references() {
        let (index, backend) = index(false);
        index.add_key("x:1", "a", 60).await.unwrap();
        index.add_key("x:2", "b", 60).await.unwrap();

        let ids = vec![index.reference_id("x:1"), index.reference_id("x:2")];
        assert_eq!(index.delete_references(&ids).await.unwrap(), 2);
        assert!(backend.is_empty().await);
        assert_eq!(index.delete_references(&[]).await.unwrap(), 0);
    }
}
