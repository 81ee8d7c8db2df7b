//! Cryptographic primitives for Capsara.
//!
//! This crate is the thin-wrapper layer: fixed-parameter AES-256-GCM,
//! RSA-OAEP key wrapping, RS256 signing, SHA-256 hashing, gzip, base64url,
//! and identifier generation, plus the keychain assembler and canonical
//! string builder that sit directly on top of them. It has no knowledge of
//! HTTP, caching, or retry policy; that lives in `capsara-client`.

pub mod aead;
pub mod canonical;
pub mod encoding;
mod error;
pub mod gzip;
pub mod hash;
pub mod ids;
pub mod key;
pub mod keychain;
pub mod rsa_keys;
pub mod sign;
pub mod wrap;

pub use error::{CryptoError, Result};
pub use key::{AuthTag, Iv, MasterKey};
