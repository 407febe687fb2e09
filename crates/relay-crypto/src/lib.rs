//! Relay Crypto - signature primitives and signed access tokens.
//!
//! This crate provides:
//! - Ed25519 key pairs with secure memory handling
//! - Detached signatures with base64 wire encoding
//! - BLAKE3 content hashing (task slot derivation, payload fingerprints)
//! - Signed, expiring access tokens and the trusted-key validator that
//!   authenticates inbound invocations
//!
//! # Trust model
//!
//! A caller proves it is trusted by presenting an [`AccessToken`]: a small
//! JSON envelope, base64-encoded on the wire, signed by a key the server
//! operator has registered as trusted. The [`TokenValidator`] rejects
//! everything else - malformed envelopes, unknown issuers, expired tokens,
//! bad signatures.
//!
//! # Example
//!
//! ```
//! use relay_crypto::{AccessToken, KeyPair, TokenValidator};
//!
//! let issuer = KeyPair::generate();
//! let token = AccessToken::issue("alice", serde_json::json!({}), &issuer, chrono::Duration::hours(1));
//!
//! let mut validator = TokenValidator::new();
//! validator.add_trusted_key(issuer.public_key());
//!
//! let caller = validator.validate(&token.encode()).unwrap();
//! assert_eq!(caller.user, "alice");
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod hash;
mod keypair;
mod signature;
mod token;

pub use error::{CryptoError, CryptoResult};
pub use hash::ContentHash;
pub use keypair::{KeyId, KeyPair, PublicKey};
pub use signature::Signature;
pub use token::{AccessToken, TokenValidator, TrustedCaller};
