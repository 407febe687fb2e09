//! Prelude module - commonly used types for convenient import.
//!
//! Use `use relay_crypto::prelude::*;` to import all essential types.

// Errors
pub use crate::{CryptoError, CryptoResult};

// Key types
pub use crate::{KeyId, KeyPair, PublicKey};

// Signature
pub use crate::Signature;

// Tokens
pub use crate::{AccessToken, TokenValidator, TrustedCaller};

// Hashing
pub use crate::ContentHash;
