//! Content hashing using BLAKE3.
//!
//! Used by the task subsystem to derive stable result-slot keys from request
//! payloads, so a resubmitted action finds the result of its own suspended
//! work and nothing else's.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CryptoError, CryptoResult};

/// A BLAKE3 content hash (32 bytes).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hash arbitrary bytes.
    #[must_use]
    pub fn hash(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Hash a JSON value in its canonical serialized form.
    ///
    /// `serde_json` orders object keys deterministically, so two values that
    /// are structurally equal hash identically.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidEncoding`] if the value cannot be
    /// serialized (non-string map keys, non-finite floats).
    pub fn hash_json(value: &serde_json::Value) -> CryptoResult<Self> {
        let bytes =
            serde_json::to_vec(value).map_err(|e| CryptoError::InvalidEncoding(e.to_string()))?;
        Ok(Self::hash(&bytes))
    }

    /// Get the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Create from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Encode as a hex string.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({}...)", &self.to_hex()[..16])
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for ContentHash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(|e| serde::de::Error::custom(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(serde::de::Error::custom("expected 32-byte hash"));
        }
        let mut raw = [0u8; 32];
        raw.copy_from_slice(&bytes);
        Ok(Self(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stable_for_equal_json() {
        let a = json!({"url": "https://example.com", "method": "GET"});
        let b = json!({"method": "GET", "url": "https://example.com"});

        assert_eq!(
            ContentHash::hash_json(&a).unwrap(),
            ContentHash::hash_json(&b).unwrap()
        );
    }

    #[test]
    fn differs_for_different_json() {
        let a = json!({"url": "https://example.com/a"});
        let b = json!({"url": "https://example.com/b"});

        assert_ne!(
            ContentHash::hash_json(&a).unwrap(),
            ContentHash::hash_json(&b).unwrap()
        );
    }
}
