//! RSA key pairs: generation, PKCS#8 PEM import/export, and fingerprinting.

use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::hash::fingerprint_pem;
use crate::{CryptoError, Result};

/// Modulus size, in bits, used when generating new key pairs.
pub const KEY_BITS: usize = 4096;

/// A public key, held as both the parsed RSA key and the exact PEM bytes it
/// was constructed from.
///
/// The fingerprint is taken over those exact PEM bytes, never a
/// re-serialization, so two byte-identical keys always fingerprint the same
/// regardless of which party re-encoded them.
#[derive(Clone)]
pub struct PublicKey {
    key: RsaPublicKey,
    pem: String,
}

impl PublicKey {
    /// Parse a public key from PKCS#8 PEM, retaining the PEM verbatim for
    /// fingerprinting.
    pub fn from_pem(pem: &str) -> Result<Self> {
        let key = RsaPublicKey::from_public_key_pem(pem)
            .map_err(|e| CryptoError::InvalidPem(e.to_string()))?;
        Ok(Self {
            key,
            pem: pem.to_string(),
        })
    }

    /// The PEM bytes this key was transmitted as.
    pub fn pem(&self) -> &str {
        &self.pem
    }

    /// SHA-256 hex fingerprint of the PEM bytes.
    pub fn fingerprint(&self) -> String {
        fingerprint_pem(&self.pem)
    }

    pub(crate) fn inner(&self) -> &RsaPublicKey {
        &self.key
    }
}

/// A private key pair, used to unwrap master keys and to produce signatures.
pub struct KeyPair {
    private: RsaPrivateKey,
    public_pem: String,
}

impl KeyPair {
    /// Generate a fresh 4096-bit RSA key pair.
    pub fn generate() -> Result<Self> {
        let mut rng = rand_core::OsRng;
        let private = RsaPrivateKey::new(&mut rng, KEY_BITS)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
        let public_pem = RsaPublicKey::from(&private)
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
        Ok(Self { private, public_pem })
    }

    /// Parse a private key from PKCS#8 PEM.
    pub fn from_pem(pem: &str) -> Result<Self> {
        let private = RsaPrivateKey::from_pkcs8_pem(pem)
            .map_err(|e| CryptoError::InvalidPem(e.to_string()))?;
        let public_pem = RsaPublicKey::from(&private)
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| CryptoError::InvalidPem(e.to_string()))?;
        Ok(Self { private, public_pem })
    }

    /// Export the private key as PKCS#8 PEM.
    pub fn to_pem(&self) -> Result<String> {
        self.private
            .to_pkcs8_pem(LineEnding::LF)
            .map(|z| z.to_string())
            .map_err(|e| CryptoError::InvalidPem(e.to_string()))
    }

    /// This key pair's public half, with its canonical PEM encoding.
    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_pem(&self.public_pem)
    }

    /// Fingerprint of this key pair's public half.
    pub fn fingerprint(&self) -> String {
        fingerprint_pem(&self.public_pem)
    }

    pub(crate) fn inner(&self) -> &RsaPrivateKey {
        &self.private
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keypair_roundtrips_through_pem() {
        let pair = KeyPair::generate().unwrap();
        let pem = pair.to_pem().unwrap();
        let reloaded = KeyPair::from_pem(&pem).unwrap();
        assert_eq!(pair.fingerprint(), reloaded.fingerprint());
    }

    #[test]
    fn fingerprint_is_stable_for_identical_pem() {
        let pair = KeyPair::generate().unwrap();
        let public_pem = pair.public_key().unwrap().pem().to_string();
        let a = PublicKey::from_pem(&public_pem).unwrap();
        let b = PublicKey::from_pem(&public_pem).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn different_keys_have_different_fingerprints() {
        let a = KeyPair::generate().unwrap();
        let b = KeyPair::generate().unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn invalid_pem_is_rejected() {
        assert!(KeyPair::from_pem("not a pem").is_err());
        assert!(PublicKey::from_pem("not a pem").is_err());
    }
}
