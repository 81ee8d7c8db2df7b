//! RS256 signatures over the canonical string, in JWS compact-triple shape.

use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use sha2::Sha256;

use crate::encoding;
use crate::rsa_keys::{KeyPair, PublicKey};
use crate::{CryptoError, Result};

/// The JWS protected header used for every capsa signature: `{"alg":"RS256"}`.
pub const PROTECTED_HEADER: &str = r#"{"alg":"RS256"}"#;

/// A produced or parsed RS256 signature triple: protected header, payload,
/// and signature, each base64url-encoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JwsTriple {
    pub protected: String,
    pub payload: String,
    pub signature: String,
}

impl JwsTriple {
    /// The exact bytes that are signed: `protected || "." || payload`.
    fn signing_input(&self) -> String {
        format!("{}.{}", self.protected, self.payload)
    }
}

/// Sign `canonical_string` with `key_pair`, producing a [`JwsTriple`].
pub fn sign(key_pair: &KeyPair, canonical_string: &str) -> Result<JwsTriple> {
    let protected = encoding::encode(PROTECTED_HEADER);
    let payload = encoding::encode(canonical_string);
    let signing_input = format!("{protected}.{payload}");

    let signing_key = SigningKey::<Sha256>::new(key_pair.inner().clone());
    let mut rng = rand_core::OsRng;
    let signature: Signature = signing_key.sign_with_rng(&mut rng, signing_input.as_bytes());

    Ok(JwsTriple {
        protected,
        payload,
        signature: encoding::encode(signature.to_bytes()),
    })
}

/// Verify a [`JwsTriple`] against `public_key`. Returns the decoded payload
/// (the original canonical string) on success.
pub fn verify(public_key: &PublicKey, triple: &JwsTriple) -> Result<String> {
    let verifying_key = VerifyingKey::<Sha256>::new(public_key.inner().clone());
    let signature_bytes = encoding::decode(&triple.signature)?;
    let signature = Signature::try_from(signature_bytes.as_slice())
        .map_err(|_| CryptoError::SignatureVerification)?;

    verifying_key
        .verify(triple.signing_input().as_bytes(), &signature)
        .map_err(|_| CryptoError::SignatureVerification)?;

    let payload_bytes = encoding::decode(&triple.payload)?;
    String::from_utf8(payload_bytes).map_err(|_| CryptoError::SignatureVerification)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let pair = KeyPair::generate().unwrap();
        let public = pair.public_key().unwrap();
        let canonical = "some|canonical;string,here";

        let triple = sign(&pair, canonical).unwrap();
        let verified = verify(&public, &triple).unwrap();

        assert_eq!(verified, canonical);
    }

    #[test]
    fn protected_header_is_rs256() {
        let pair = KeyPair::generate().unwrap();
        let triple = sign(&pair, "payload").unwrap();
        assert_eq!(encoding::decode(&triple.protected).unwrap(), PROTECTED_HEADER.as_bytes());
    }

    #[test]
    fn wrong_public_key_fails_verification() {
        let pair_a = KeyPair::generate().unwrap();
        let pair_b = KeyPair::generate().unwrap();
        let public_b = pair_b.public_key().unwrap();

        let triple = sign(&pair_a, "canonical").unwrap();
        assert!(verify(&public_b, &triple).is_err());
    }

    #[test]
    fn tampered_payload_fails_verification() {
        let pair = KeyPair::generate().unwrap();
        let public = pair.public_key().unwrap();

        let mut triple = sign(&pair, "original payload").unwrap();
        triple.payload = encoding::encode("tampered payload");
        assert!(verify(&public, &triple).is_err());
    }

    #[test]
    fn tampered_signature_fails_verification() {
        let pair = KeyPair::generate().unwrap();
        let public = pair.public_key().unwrap();

        let triple = sign(&pair, "payload").unwrap();
        let mut sig_bytes = encoding::decode(&triple.signature).unwrap();
        let last = sig_bytes.len() - 1;
        sig_bytes[last] ^= 0xFF;
        let tampered = JwsTriple {
            signature: encoding::encode(&sig_bytes),
            ..triple
        };
        assert!(verify(&public, &tampered).is_err());
    }
}
