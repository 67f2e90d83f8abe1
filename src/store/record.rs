//! Persisted Record Module
//!
//! Defines the two record families sharing one keyed collection. Field
//! names follow the on-disk layout (`_id`, `createdAt`, `expireAt`).

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// == Value Record ==
/// A cached payload stored under its encoded value id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueRecord {
    #[serde(rename = "_id")]
    pub id: String,
    /// Opaque payload, stored as given
    pub value: Value,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_at: Option<DateTime<Utc>>,
}

// == Reference Record ==
/// Reverse index entry: every raw key tagged with one reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceRecord {
    #[serde(rename = "_id")]
    pub id: String,
    /// Raw, unencoded cache keys
    pub keys: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    /// Expiry of the most recently written contributing entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_at: Option<DateTime<Utc>>,
}

// == Document ==
/// Any record held by a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Document {
    Value(ValueRecord),
    Reference(ReferenceRecord),
}

impl Document {
    pub fn id(&self) -> &str {
        match self {
            Document::Value(record) => &record.id,
            Document::Reference(record) => &record.id,
        }
    }

    pub fn expire_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Document::Value(record) => record.expire_at,
            Document::Reference(record) => record.expire_at,
        }
    }

    /// Replaces the expiry attribute; `None` removes it.
    pub fn set_expire_at(&mut self, expire_at: Option<DateTime<Utc>>) {
        match self {
            Document::Value(record) => record.expire_at = expire_at,
            Document::Reference(record) => record.expire_at = expire_at,
        }
    }

    /// Whether the reaper is allowed to delete this document at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expire_at().is_some_and(|expire_at| expire_at <= now)
    }

    pub fn into_value(self) -> Option<ValueRecord> {
        match self {
            Document::Value(record) => Some(record),
            Document::Reference(_) => None,
        }
    }

    pub fn into_reference(self) -> Option<ReferenceRecord> {
        match self {
            Document::Reference(record) => Some(record),
            Document::Value(_) => None,
        }
    }
}
