//! Configuration Module
//!
//! Handles loading and validating cache backend configuration from
//! environment variables.

use std::env;

use crate::error::{CacheError, Result};

/// Cache backend configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
/// The two prefixes are part of the persisted layout: changing them makes
/// previously written records invisible.
#[derive(Debug, Clone)]
pub struct Config {
    /// Id prefix of the value record family
    pub value_prefix: String,
    /// Id prefix of the reference record family
    pub reference_prefix: String,
    /// Raw keys longer than this are replaced by their SHA-256 hex digest
    pub max_key_length: usize,
    /// Reaper sweep interval in seconds for backends that run one in-process
    pub reaper_interval: u64,
    /// Anchor wildcard matches at the end of the id as well as the start
    pub full_anchor_wildcards: bool,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `REFCACHE_VALUE_PREFIX` - Value id prefix (default: `value:`)
    /// - `REFCACHE_REFERENCE_PREFIX` - Reference id prefix (default: `ref:`)
    /// - `REFCACHE_MAX_KEY_LENGTH` - Longest key kept verbatim (default: 200)
    /// - `REFCACHE_REAPER_INTERVAL` - Reaper frequency in seconds (default: 60)
    /// - `REFCACHE_FULL_ANCHOR` - Fully anchor wildcard patterns (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            value_prefix: env::var("REFCACHE_VALUE_PREFIX").unwrap_or(defaults.value_prefix),
            reference_prefix: env::var("REFCACHE_REFERENCE_PREFIX")
                .unwrap_or(defaults.reference_prefix),
            max_key_length: env::var("REFCACHE_MAX_KEY_LENGTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_key_length),
            reaper_interval: env::var("REFCACHE_REAPER_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.reaper_interval),
            full_anchor_wildcards: env::var("REFCACHE_FULL_ANCHOR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.full_anchor_wildcards),
        }
    }

    /// Checks that the two record families cannot collide.
    pub fn validate(&self) -> Result<()> {
        if self.value_prefix.is_empty() || self.reference_prefix.is_empty() {
            return Err(CacheError::Configuration(
                "namespace prefixes must not be empty".to_string(),
            ));
        }
        if self.value_prefix.starts_with(&self.reference_prefix)
            || self.reference_prefix.starts_with(&self.value_prefix)
        {
            return Err(CacheError::Configuration(format!(
                "namespace prefixes overlap: {:?} and {:?}",
                self.value_prefix, self.reference_prefix
            )));
        }
        if self.max_key_length == 0 {
            return Err(CacheError::Configuration(
                "max_key_length must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            value_prefix: "value:".to_string(),
            reference_prefix: "ref:".to_string(),
            max_key_length: 200,
            reaper_interval: 60,
            full_anchor_wildcards: false,
        }
    }
}
