//! Cryptographic error types.

use thiserror::Error;

/// Errors that can occur during cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Invalid key length.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected length in bytes.
        expected: usize,
        /// Actual length in bytes.
        actual: usize,
    },

    /// Invalid signature length.
    #[error("invalid signature length: expected {expected}, got {actual}")]
    InvalidSignatureLength {
        /// Expected length in bytes.
        expected: usize,
        /// Actual length in bytes.
        actual: usize,
    },

    /// Invalid public key.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Signature verification failed.
    #[error("signature verification failed")]
    VerificationFailed,

    /// Invalid base64 or hex encoding.
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    /// An access token could not be decoded.
    #[error("malformed access token: {0}")]
    MalformedToken(String),

    /// An access token is past its expiry.
    #[error("access token expired")]
    TokenExpired,

    /// An access token was issued by a key that is not trusted.
    #[error("untrusted issuer: {0}")]
    UntrustedIssuer(String),
}

/// Result type for cryptographic operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
