//! Signed, expiring access tokens.
//!
//! An [`AccessToken`] is the opaque "signature" string callers attach to an
//! invocation. On the wire it is base64(JSON); inside it carries the caller
//! identity, an expiry, arbitrary issuer-defined claims, the issuer's public
//! key and an ed25519 signature over a versioned byte layout.
//!
//! The [`TokenValidator`] holds the registry of trusted issuer keys and turns
//! a raw token string into a [`TrustedCaller`], or fails.

use std::collections::HashMap;

use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CryptoError, CryptoResult};
use crate::keypair::{KeyId, KeyPair, PublicKey};
use crate::signature::Signature;

/// Version of the token signing-data format.
/// Increment when the signed byte layout changes.
const SIGNING_DATA_VERSION: u8 = 0x01;

/// Default clock skew tolerance in seconds.
const DEFAULT_CLOCK_SKEW_SECS: i64 = 30;

/// Write a length-prefixed byte slice to the output buffer.
///
/// Format: 4-byte little-endian length followed by the data.
#[allow(clippy::cast_possible_truncation)]
fn write_length_prefixed(data: &mut Vec<u8>, bytes: &[u8]) {
    // Token fields are small; u32 lengths are more than enough.
    data.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    data.extend_from_slice(bytes);
}

/// A signed access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    /// Caller identity the issuer vouches for.
    pub user: String,
    /// When the token was issued.
    pub issued_at: DateTime<Utc>,
    /// When the token expires.
    pub expires_at: DateTime<Utc>,
    /// Issuer-defined claims, passed through to handlers untouched.
    pub data: Value,
    /// Public key of the issuer.
    pub issuer: PublicKey,
    /// Signature over [`AccessToken::signing_data`].
    pub signature: Signature,
}

impl AccessToken {
    /// Issue a new token signed by `issuer_key`, valid for `ttl`.
    #[must_use]
    pub fn issue(user: impl Into<String>, data: Value, issuer_key: &KeyPair, ttl: Duration) -> Self {
        let issued_at = Utc::now();
        // Safety: chrono DateTime addition cannot overflow for sane TTLs.
        #[allow(clippy::arithmetic_side_effects)]
        let expires_at = issued_at + ttl;

        let mut token = Self {
            user: user.into(),
            issued_at,
            expires_at,
            data,
            issuer: issuer_key.public_key(),
            signature: Signature::from_bytes([0u8; 64]), // Placeholder
        };
        token.signature = issuer_key.sign(&token.signing_data());
        token
    }

    /// Get the data used for signing (excludes the signature itself).
    ///
    /// Format (v1):
    /// - 1 byte: version (0x01)
    /// - Length-prefixed user string
    /// - 8 bytes: `issued_at` timestamp (i64 LE)
    /// - 8 bytes: `expires_at` timestamp (i64 LE)
    /// - Length-prefixed canonical JSON of `data`
    /// - 32 bytes: issuer public key
    #[must_use]
    pub fn signing_data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(256);

        data.push(SIGNING_DATA_VERSION);
        write_length_prefixed(&mut data, self.user.as_bytes());
        data.extend_from_slice(&self.issued_at.timestamp().to_le_bytes());
        data.extend_from_slice(&self.expires_at.timestamp().to_le_bytes());

        // serde_json orders object keys, so this is canonical for our needs.
        let claims = serde_json::to_vec(&self.data).unwrap_or_default();
        write_length_prefixed(&mut data, &claims);

        data.extend_from_slice(self.issuer.as_bytes());
        data
    }

    /// Encode for the wire: base64 over the JSON envelope.
    #[must_use]
    pub fn encode(&self) -> String {
        let json = serde_json::to_vec(self).unwrap_or_default();
        base64::engine::general_purpose::STANDARD.encode(json)
    }

    /// Decode a wire token string.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::MalformedToken`] if the string is not base64
    /// or the envelope is not the expected JSON shape.
    pub fn decode(raw: &str) -> CryptoResult<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(raw.trim())
            .map_err(|e| CryptoError::MalformedToken(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| CryptoError::MalformedToken(e.to_string()))
    }

    /// Check whether the token is past its expiry, with skew tolerance.
    #[must_use]
    pub fn is_expired_with_skew(&self, skew_secs: i64) -> bool {
        // Safety: chrono DateTime addition cannot overflow for sane skews.
        #[allow(clippy::arithmetic_side_effects)]
        let adjusted = self.expires_at + Duration::seconds(skew_secs);
        Utc::now() > adjusted
    }

    /// Verify the token's own signature (does not check issuer trust).
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::VerificationFailed`] if the signature does not
    /// match the signed byte layout.
    pub fn verify_signature(&self) -> CryptoResult<()> {
        self.issuer.verify(&self.signing_data(), &self.signature)
    }
}

/// Trusted contextual data extracted from a valid token.
///
/// This is what handlers see; the raw token never reaches them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustedCaller {
    /// Caller identity.
    pub user: String,
    /// Issuer-defined claims.
    pub data: Value,
    /// Short ID of the issuer key that vouched for the caller.
    pub key_id: KeyId,
}

/// Validates access tokens against a registry of trusted issuer keys.
#[derive(Debug, Clone, Default)]
pub struct TokenValidator {
    trusted_keys: HashMap<KeyId, PublicKey>,
    skew_secs: i64,
}

impl TokenValidator {
    /// Create a validator with no trusted keys and the default clock skew.
    #[must_use]
    pub fn new() -> Self {
        Self {
            trusted_keys: HashMap::new(),
            skew_secs: DEFAULT_CLOCK_SKEW_SECS,
        }
    }

    /// Override the clock skew tolerance.
    #[must_use]
    pub fn with_skew_secs(mut self, skew_secs: i64) -> Self {
        self.skew_secs = skew_secs;
        self
    }

    /// Add an issuer key to the trusted set. Returns its key ID.
    pub fn add_trusted_key(&mut self, key: PublicKey) -> KeyId {
        let key_id = key.key_id();
        self.trusted_keys.insert(key_id, key);
        key_id
    }

    /// Remove an issuer key. Returns `true` if it was present.
    pub fn remove_trusted_key(&mut self, key_id: &KeyId) -> bool {
        self.trusted_keys.remove(key_id).is_some()
    }

    /// Check if a key ID is trusted.
    #[must_use]
    pub fn is_trusted(&self, key_id: &KeyId) -> bool {
        self.trusted_keys.contains_key(key_id)
    }

    /// Number of trusted keys.
    #[must_use]
    pub fn trusted_key_count(&self) -> usize {
        self.trusted_keys.len()
    }

    /// Validate a raw token string into trusted caller data.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is malformed, issued by an untrusted
    /// key, carries an issuer key that differs from the registered one,
    /// expired, or fails signature verification.
    pub fn validate(&self, raw: &str) -> CryptoResult<TrustedCaller> {
        let token = AccessToken::decode(raw)?;
        let key_id = token.issuer.key_id();

        let registered = self
            .trusted_keys
            .get(&key_id)
            .ok_or_else(|| CryptoError::UntrustedIssuer(hex::encode(key_id)))?;
        if *registered != token.issuer {
            // Key-ID collision or a forged envelope; either way, reject.
            return Err(CryptoError::UntrustedIssuer(hex::encode(key_id)));
        }

        token.verify_signature()?;

        if token.is_expired_with_skew(self.skew_secs) {
            return Err(CryptoError::TokenExpired);
        }

        Ok(TrustedCaller {
            user: token.user,
            data: token.data,
            key_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validator_for(key: &KeyPair) -> TokenValidator {
        let mut validator = TokenValidator::new();
        validator.add_trusted_key(key.public_key());
        validator
    }

    #[test]
    fn validates_freshly_issued_token() {
        let issuer = KeyPair::generate();
        let token = AccessToken::issue(
            "alice",
            json!({"tier": "gold"}),
            &issuer,
            Duration::hours(1),
        );

        let caller = validator_for(&issuer).validate(&token.encode()).unwrap();
        assert_eq!(caller.user, "alice");
        assert_eq!(caller.data["tier"], "gold");
        assert_eq!(caller.key_id, issuer.key_id());
    }

    #[test]
    fn rejects_untrusted_issuer() {
        let issuer = KeyPair::generate();
        let other = KeyPair::generate();
        let token = AccessToken::issue("mallory", json!({}), &other, Duration::hours(1));

        let result = validator_for(&issuer).validate(&token.encode());
        assert!(matches!(result, Err(CryptoError::UntrustedIssuer(_))));
    }

    #[test]
    fn rejects_expired_token() {
        let issuer = KeyPair::generate();
        let token = AccessToken::issue("alice", json!({}), &issuer, Duration::hours(-2));

        let result = validator_for(&issuer).validate(&token.encode());
        assert!(matches!(result, Err(CryptoError::TokenExpired)));
    }

    #[test]
    fn rejects_tampered_claims() {
        let issuer = KeyPair::generate();
        let mut token = AccessToken::issue("alice", json!({"tier": "free"}), &issuer, Duration::hours(1));
        token.data = json!({"tier": "gold"});

        let result = validator_for(&issuer).validate(&token.encode());
        assert!(matches!(result, Err(CryptoError::VerificationFailed)));
    }

    #[test]
    fn rejects_garbage() {
        let issuer = KeyPair::generate();
        let validator = validator_for(&issuer);

        assert!(matches!(
            validator.validate("not-a-token"),
            Err(CryptoError::MalformedToken(_))
        ));
        assert!(matches!(
            validator.validate(""),
            Err(CryptoError::MalformedToken(_))
        ));
    }
}
