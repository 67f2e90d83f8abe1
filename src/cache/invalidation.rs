//! Invalidation Engine Module
//!
//! Resolves a reference (or a wildcard over references) to the keys it
//! tags, then deletes those values followed by the reference records.
//! Values go first: an interrupted pass leaves an orphan reference
//! pointing at missing values, never live values with no reference.

use std::collections::BTreeSet;
use std::ops::AddAssign;
use std::sync::Arc;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::references::WILDCARD;
use crate::cache::{KeyCodec, ReferenceIndex, ValueStore};
use crate::error::Result;
use crate::store::DocumentBackend;

// == Invalidation Report ==
/// Counts of records removed by an invalidation or clear.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Invalidation {
    /// Reference records deleted
    pub references_removed: u64,
    /// Value records deleted
    pub values_removed: u64,
}

impl AddAssign for Invalidation {
    fn add_assign(&mut self, other: Self) {
        self.references_removed += other.references_removed;
        self.values_removed += other.values_removed;
    }
}

// == Invalidation Engine ==
/// Stateless invalidation flows over a value store and a reference index.
#[derive(Clone)]
pub struct InvalidationEngine {
    backend: Arc<dyn DocumentBackend>,
    codec: KeyCodec,
    values: ValueStore,
    references: ReferenceIndex,
}

impl InvalidationEngine {
    // == Constructor ==
    pub fn new(
        backend: Arc<dyn DocumentBackend>,
        codec: KeyCodec,
        values: ValueStore,
        references: ReferenceIndex,
    ) -> Self {
        Self {
            backend,
            codec,
            values,
            references,
        }
    }

    // == Invalidate ==
    /// Invalidates one reference, routing wildcards to pattern matching.
    pub async fn invalidate(&self, reference: &str) -> Result<Invalidation> {
        if reference.contains(WILDCARD) {
            self.invalidate_wildcard(reference).await
        } else {
            self.invalidate_exact(reference).await
        }
    }

    /// Invalidates each reference in order.
    ///
    /// Entries are independent: a failure is logged and the remaining
    /// entries are still processed. The first failure is returned once
    /// every entry has been attempted.
    pub async fn invalidate_many(&self, references: &[&str]) -> Result<Invalidation> {
        let mut total = Invalidation::default();
        let mut first_error = None;

        for reference in references {
            match self.invalidate(reference).await {
                Ok(report) => total += report,
                Err(err) => {
                    warn!(reference = %reference, error = %err, "Invalidation failed");
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(total),
        }
    }

    // == Exact ==
    /// Deletes every value tagged with `reference`, then the reference.
    ///
    /// An unknown reference is a no-op.
    pub async fn invalidate_exact(&self, reference: &str) -> Result<Invalidation> {
        let keys = self.references.lookup(reference).await?;
        if keys.is_empty() {
            debug!(reference = %reference, "Nothing to invalidate");
            return Ok(Invalidation::default());
        }

        let values_removed = self.values.remove_many(&keys).await?;
        let references_removed = self
            .references
            .delete_reference(&self.references.reference_id(reference))
            .await?;

        debug!(reference = %reference, values_removed, "Reference invalidated");
        Ok(Invalidation {
            references_removed,
            values_removed,
        })
    }

    // == Wildcard ==
    /// Deletes every value tagged with any reference matching `pattern`,
    /// then all matched references.
    pub async fn invalidate_wildcard(&self, pattern: &str) -> Result<Invalidation> {
        let matched = self.references.lookup_by_pattern(pattern).await?;
        if matched.is_empty() {
            debug!(pattern = %pattern, "No references matched");
            return Ok(Invalidation::default());
        }

        let keys: BTreeSet<&String> = matched.values().flatten().collect();
        let values_removed = self.values.remove_many(keys).await?;

        let ids: Vec<String> = matched.into_keys().collect();
        let references_removed = self.references.delete_references(&ids).await?;

        debug!(
            pattern = %pattern,
            references_removed,
            values_removed,
            "Wildcard invalidated"
        );
        Ok(Invalidation {
            references_removed,
            values_removed,
        })
    }

    // == Clear ==
    /// Deletes every value and reference record, selected by id prefix.
    pub async fn clear(&self) -> Result<Invalidation> {
        let report = Invalidation {
            values_removed: self.clear_prefix(self.codec.value_prefix()).await?,
            references_removed: self.clear_prefix(self.codec.reference_prefix()).await?,
        };

        debug!(
            values_removed = report.values_removed,
            references_removed = report.references_removed,
            "Cache cleared"
        );
        Ok(report)
    }

    /// Deletes every document whose id starts with `prefix`.
    ///
    /// Goes through the pattern query and fetches whole documents just to
    /// read their ids. A networked store should run this as one
    /// server-side delete-by-prefix instead.
    async fn clear_prefix(&self, prefix: &str) -> Result<u64> {
        let matcher = Regex::new(&format!("^{}", regex::escape(prefix)))?;
        let ids: Vec<String> = self
            .backend
            .find_by_id_pattern(&matcher)
            .await?
            .iter()
            .map(|document| document.id().to_string())
            .collect();
        if ids.is_empty() {
            return Ok(0);
        }
        self.backend.delete_many(&ids).await
    }
}
