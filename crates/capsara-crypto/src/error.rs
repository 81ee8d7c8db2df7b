//! Error types for the capsara-crypto crate

use thiserror::Error;

/// Result type alias using `CryptoError`
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors that can occur during cryptographic operations
#[derive(Error, Debug, Clone)]
pub enum CryptoError {
    /// Key generation failed
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// RSA-OAEP wrap/unwrap failed
    #[error("key wrap failed: {0}")]
    Wrap(String),

    /// RSA-OAEP unwrap failed (wrong key, corrupted ciphertext)
    #[error("key unwrap failed: {0}")]
    Unwrap(String),

    /// AES-GCM encryption failed
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// AES-GCM decryption or tag verification failed
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Invalid key format or length
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Invalid PEM encoding
    #[error("invalid PEM: {0}")]
    InvalidPem(String),

    /// RS256 signature production failed
    #[error("signing failed: {0}")]
    Signing(String),

    /// RS256 signature verification failed
    #[error("signature verification failed")]
    SignatureVerification,

    /// Invalid nonce/IV length
    #[error("invalid iv: {0}")]
    InvalidIv(String),

    /// Gzip compression/decompression failed
    #[error("gzip error: {0}")]
    Gzip(String),

    /// Base64url decode error
    #[error("base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// Hex decode error
    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),

    /// A keychain entry's delegate `actingFor` set exceeded the limit
    #[error("delegate {party_id} acts for {count} parties, limit is {limit}")]
    TooManyActingFor {
        party_id: String,
        count: usize,
        limit: usize,
    },
}
