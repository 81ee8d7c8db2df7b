//! The per-capsa master key and the IVs/tags that accompany every use of it.

use rand::RngCore;
use rand::rngs::OsRng;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{CryptoError, Result};

/// Size of the master key in bytes (256 bits).
pub const MASTER_KEY_SIZE: usize = 32;

/// Size of an AES-GCM IV/nonce in bytes (96 bits).
pub const IV_SIZE: usize = 12;

/// Size of an AES-GCM authentication tag in bytes (128 bits).
pub const TAG_SIZE: usize = 16;

/// The 32-byte symmetric key unique to one capsa.
///
/// Exclusively owned by the builder during construction; zeroed on drop so
/// that neither a forgotten builder nor an evicted cache entry leaves key
/// material readable in freed memory.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey([u8; MASTER_KEY_SIZE]);

impl MasterKey {
    /// Generate a fresh random master key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; MASTER_KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Reconstruct a master key from raw bytes (e.g. after an RSA-OAEP unwrap).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != MASTER_KEY_SIZE {
            return Err(CryptoError::InvalidKey(format!(
                "master key must be {MASTER_KEY_SIZE} bytes, got {}",
                bytes.len()
            )));
        }
        let mut arr = [0u8; MASTER_KEY_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    /// Borrow the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; MASTER_KEY_SIZE] {
        &self.0
    }
}

/// A 12-byte random nonce, generated fresh for every AES-GCM encryption.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Iv([u8; IV_SIZE]);

impl Iv {
    /// Generate a fresh random IV.
    pub fn generate() -> Self {
        let mut bytes = [0u8; IV_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Reconstruct an IV from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != IV_SIZE {
            return Err(CryptoError::InvalidIv(format!(
                "iv must be {IV_SIZE} bytes, got {}",
                bytes.len()
            )));
        }
        let mut arr = [0u8; IV_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    /// Borrow the raw IV bytes.
    pub fn as_bytes(&self) -> &[u8; IV_SIZE] {
        &self.0
    }

    /// Base64url-encode this IV for wire transmission.
    pub fn to_base64url(&self) -> String {
        crate::encoding::encode(self.0)
    }

    /// Decode a base64url-encoded IV.
    pub fn from_base64url(s: &str) -> Result<Self> {
        Self::from_bytes(&crate::encoding::decode(s)?)
    }
}

/// The 16-byte GCM authentication tag accompanying one ciphertext.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct AuthTag([u8; TAG_SIZE]);

impl AuthTag {
    /// Reconstruct a tag from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != TAG_SIZE {
            return Err(CryptoError::InvalidKey(format!(
                "auth tag must be {TAG_SIZE} bytes, got {}",
                bytes.len()
            )));
        }
        let mut arr = [0u8; TAG_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    /// Borrow the raw tag bytes.
    pub fn as_bytes(&self) -> &[u8; TAG_SIZE] {
        &self.0
    }

    /// Base64url-encode this tag for wire transmission.
    pub fn to_base64url(&self) -> String {
        crate::encoding::encode(self.0)
    }

    /// Decode a base64url-encoded tag.
    pub fn from_base64url(s: &str) -> Result<Self> {
        Self::from_bytes(&crate::encoding::decode(s)?)
    }
}
