//! Capsara: a client library for a zero-knowledge, multi-party encrypted
//! file-exchange service.
//!
//! This crate is a thin re-export facade over its two workspace members —
//! `capsara-crypto` (primitives: AES-GCM, RSA-OAEP/RS256, SHA-256, gzip,
//! base64url, the keychain assembler, the canonical signer) and
//! `capsara-client` (`CapsaBuilder`, `CapsaDecryptor`, the master-key cache,
//! and the retrying transport policy) — for callers who want a single
//! dependency rather than wiring up both crates themselves.

pub use capsara_client as client;
pub use capsara_crypto as crypto;
