//! Expiration Policy Module
//!
//! Converts relative TTLs into absolute expiry instants and back. A TTL of
//! zero or less means the record never expires and carries no expiry at
//! all. Physical deletion is left to the backing store's reaper.

use chrono::{DateTime, Duration, Utc};

// == Expire At ==
/// Absolute expiry for a TTL given in seconds, or `None` for `ttl_seconds <= 0`.
pub fn expire_at(ttl_seconds: i64, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if ttl_seconds > 0 {
        Duration::try_seconds(ttl_seconds).and_then(|ttl| now.checked_add_signed(ttl))
    } else {
        None
    }
}

// == Is Expired ==
/// Whether a record with this expiry is logically gone at `now`.
///
/// Boundary condition: a record is expired once `now >= expire_at`.
pub fn is_expired(expire_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    expire_at.is_some_and(|expire_at| now >= expire_at)
}

// == Remaining Seconds ==
/// Whole seconds left before expiry, floor-rounded and clamped at zero.
///
/// Returns 0 for immortal records.
pub fn remaining_seconds(expire_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> u64 {
    expire_at
        .map(|expire_at| (expire_at - now).num_milliseconds().max(0) as u64 / 1000)
        .unwrap_or(0)
}
