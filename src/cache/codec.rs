//! Key Codec Module
//!
//! Turns raw cache keys and reference names into bounded-length document
//! ids. Short inputs stay readable; long ones are replaced by their
//! SHA-256 digest. Each family gets its own prefix so ids never collide.

use sha2::{Digest, Sha256};

use crate::config::Config;

// == Key Codec ==
/// Encodes raw keys into prefixed, length-capped ids.
#[derive(Debug, Clone)]
pub struct KeyCodec {
    value_prefix: String,
    reference_prefix: String,
    max_key_length: usize,
}

impl KeyCodec {
    // == Constructor ==
    /// Creates a codec for the given namespace prefixes.
    ///
    /// # Arguments
    /// * `value_prefix` - Prefix of value record ids
    /// * `reference_prefix` - Prefix of reference record ids
    /// * `max_key_length` - Longest raw input (in bytes) kept verbatim
    pub fn new(
        value_prefix: impl Into<String>,
        reference_prefix: impl Into<String>,
        max_key_length: usize,
    ) -> Self {
        Self {
            value_prefix: value_prefix.into(),
            reference_prefix: reference_prefix.into(),
            max_key_length,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.value_prefix.clone(),
            config.reference_prefix.clone(),
            config.max_key_length,
        )
    }

    // == Encode ==
    /// Returns `prefix + raw`, or `prefix + sha256hex(raw)` when `raw` is
    /// longer than the configured maximum.
    pub fn encode(&self, raw: &str, prefix: &str) -> String {
        if raw.len() <= self.max_key_length {
            format!("{prefix}{raw}")
        } else {
            format!("{prefix}{}", sha256_hex(raw))
        }
    }

    /// Id of the value record holding `raw_key`.
    pub fn value_id(&self, raw_key: &str) -> String {
        self.encode(raw_key, &self.value_prefix)
    }

    /// Id of the reference record for `raw_reference`.
    pub fn reference_id(&self, raw_reference: &str) -> String {
        self.encode(raw_reference, &self.reference_prefix)
    }

    pub fn value_prefix(&self) -> &str {
        &self.value_prefix
    }

    pub fn reference_prefix(&self) -> &str {
        &self.reference_prefix
    }
}

impl Default for KeyCodec {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Lowercase hex SHA-256 digest of `raw`.
pub fn sha256_hex(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_key_kept_verbatim() {
        let codec = KeyCodec::default();
        assert_eq!(codec.value_id("user:42"), "value:user:42");
        assert_eq!(codec.reference_id("user:42"), "ref:user:42");
    }

    #[test]
    fn test_length_boundary() {
        let codec = KeyCodec::default();
        let at_limit = "k".repeat(200);
        let over_limit = "k".repeat(201);

        assert_eq!(codec.value_id(&at_limit), format!("value:{at_limit}"));

        let hashed = codec.value_id(&over_limit);
        assert_eq!(hashed, format!("value:{}", sha256_hex(&over_limit)));
        assert_eq!(hashed.len(), "value:".len() + 64);
    }

    #[test]
    fn test_hashing_is_deterministic() {
        let codec = KeyCodec::default();
        let long = "x".repeat(500);
        assert_eq!(codec.value_id(&long), codec.value_id(&long));
    }

    #[test]
    fn test_namespaces_do_not_collide() {
        let codec = KeyCodec::default();
        assert_ne!(codec.value_id("same"), codec.reference_id("same"));
    }

    #[test]
    fn test_known_digest() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
