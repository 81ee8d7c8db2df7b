//! RSA-OAEP wrapping of the 32-byte master key.

use rsa::Oaep;
use sha2::Sha256;

use crate::key::MasterKey;
use crate::rsa_keys::{KeyPair, PublicKey};
use crate::{CryptoError, Result};

/// Wrap `master_key` under `public_key`, producing the raw RSA-OAEP
/// ciphertext (callers base64url-encode it for the wire).
pub fn wrap(public_key: &PublicKey, master_key: &MasterKey) -> Result<Vec<u8>> {
    let mut rng = rand_core::OsRng;
    public_key
        .inner()
        .encrypt(&mut rng, Oaep::new::<Sha256>(), master_key.as_bytes())
        .map_err(|e| CryptoError::Wrap(e.to_string()))
}

/// Unwrap a master key previously produced by [`wrap`].
pub fn unwrap(key_pair: &KeyPair, wrapped: &[u8]) -> Result<MasterKey> {
    let plaintext = key_pair
        .inner()
        .decrypt(Oaep::new::<Sha256>(), wrapped)
        .map_err(|e| CryptoError::Unwrap(e.to_string()))?;
    MasterKey::from_bytes(&plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let pair = KeyPair::generate().unwrap();
        let public = pair.public_key().unwrap();
        let master_key = MasterKey::generate();

        let wrapped = wrap(&public, &master_key).unwrap();
        let unwrapped = unwrap(&pair, &wrapped).unwrap();

        assert_eq!(master_key.as_bytes(), unwrapped.as_bytes());
    }

    #[test]
    fn wrapping_is_randomized() {
        let pair = KeyPair::generate().unwrap();
        let public = pair.public_key().unwrap();
        let master_key = MasterKey::generate();

        let a = wrap(&public, &master_key).unwrap();
        let b = wrap(&public, &master_key).unwrap();
        assert_ne!(a, b, "OAEP padding must be randomized");
    }

    #[test]
    fn wrong_private_key_fails_to_unwrap() {
        let pair_a = KeyPair::generate().unwrap();
        let pair_b = KeyPair::generate().unwrap();
        let public_a = pair_a.public_key().unwrap();
        let master_key = MasterKey::generate();

        let wrapped = wrap(&public_a, &master_key).unwrap();
        assert!(unwrap(&pair_b, &wrapped).is_err());
    }

    #[test]
    fn tampered_wrapped_key_fails() {
        let pair = KeyPair::generate().unwrap();
        let public = pair.public_key().unwrap();
        let master_key = MasterKey::generate();

        let mut wrapped = wrap(&public, &master_key).unwrap();
        let last = wrapped.len() - 1;
        wrapped[last] ^= 0xFF;
        assert!(unwrap(&pair, &wrapped).is_err());
    }
}
