//! AES-256-GCM encryption with the ciphertext and authentication tag kept
//! as two separate values, since the wire format never concatenates them.

use aes_gcm::aead::Aead as AeadTrait;
use aes_gcm::{Aes256Gcm, KeyInit};

use crate::key::{AuthTag, Iv, MasterKey, TAG_SIZE};
use crate::{CryptoError, Result};

/// Encrypt `plaintext` under `key` with the given `iv`, returning the
/// ciphertext and authentication tag as two separate buffers.
pub fn encrypt(key: &MasterKey, iv: &Iv, plaintext: &[u8]) -> Result<(Vec<u8>, AuthTag)> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;
    let nonce = aes_gcm::Nonce::from_slice(iv.as_bytes());
    let mut combined = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;
    let tag_start = combined.len() - TAG_SIZE;
    let tag = AuthTag::from_bytes(&combined[tag_start..])?;
    combined.truncate(tag_start);
    Ok((combined, tag))
}

/// Decrypt a ciphertext and tag produced by [`encrypt`]. Fails closed on any
/// tampering: wrong key, wrong IV, truncated/appended ciphertext, or a
/// mismatched tag.
pub fn decrypt(key: &MasterKey, iv: &Iv, ciphertext: &[u8], tag: &AuthTag) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::Decryption(e.to_string()))?;
    let nonce = aes_gcm::Nonce::from_slice(iv.as_bytes());
    let mut combined = Vec::with_capacity(ciphertext.len() + TAG_SIZE);
    combined.extend_from_slice(ciphertext);
    combined.extend_from_slice(tag.as_bytes());
    cipher
        .decrypt(nonce, combined.as_slice())
        .map_err(|e| CryptoError::Decryption(e.to_string()))
}
