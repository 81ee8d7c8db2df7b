//! SHA-256 hashing: ciphertext integrity hashes and public-key fingerprints.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 digest of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Fingerprint of a public key: SHA-256 hex of its PEM encoding, taken
/// verbatim over the exact bytes the key was transmitted as.
pub fn fingerprint_pem(pem: &str) -> String {
    sha256_hex(pem.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector_empty_input() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn hash_is_deterministic() {
        let data = b"Hello, World!";
        assert_eq!(sha256_hex(data), sha256_hex(data));
    }

    #[test]
    fn different_input_different_hash() {
        assert_ne!(sha256_hex(b"a"), sha256_hex(b"b"));
    }

    #[test]
    fn fingerprint_is_sha256_of_pem_bytes() {
        let pem = "-----BEGIN PUBLIC KEY-----\nMIIB...\n-----END PUBLIC KEY-----\n";
        assert_eq!(fingerprint_pem(pem), sha256_hex(pem.as_bytes()));
    }
}
