//! Wire types for a capsa: the JSON payload shape exchanged with the server.

use capsara_crypto::keychain::KeychainEntry;
use capsara_crypto::sign::JwsTriple;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default delivery priority for a capsa.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Normal,
    High,
    Low,
}

/// An AES-256-GCM encrypted blob as it appears on the wire: ciphertext, IV,
/// and tag, each base64url.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedBlob {
    pub ciphertext: String,
    pub iv: String,
    pub tag: String,
}

/// One file record in an uploaded capsa.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedFile {
    pub file_id: String,
    pub encrypted_filename: EncryptedBlob,
    pub content: EncryptedBlob,
    pub mime_type: String,
    pub ciphertext_size: u64,
    pub hash_hex: String,
    pub hash_algorithm: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression: Option<CompressionInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Reference to a one-way transform applied server-side (e.g. a
    /// thumbnail or preview derivative); never populated by this client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub one_way_transform_ref: Option<String>,
}

/// Compression metadata recorded when a file's content was gzip-compressed.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionInfo {
    pub algorithm: String,
    pub original_size: u64,
}

/// Unencrypted metadata attached to a capsa.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapsaMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_packages: Vec<String>,
}

/// Access-control settings on a capsa.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessControl {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// The full upload payload produced by [`crate::builder::CapsaBuilder::build`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapsaUploadData {
    pub package_id: String,
    pub keychain: Vec<KeychainEntry>,
    pub signature: SignatureWire,
    pub access_control: AccessControl,
    #[serde(default)]
    pub priority: Priority,
    pub files: Vec<EncryptedFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<EncryptedBlob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<EncryptedBlob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured: Option<EncryptedBlob>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<CapsaMetadata>,
}

/// The JWS signature triple as serialized on the wire.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureWire {
    pub protected: String,
    pub payload: String,
    pub signature: String,
}

impl From<JwsTriple> for SignatureWire {
    fn from(triple: JwsTriple) -> Self {
        Self {
            protected: triple.protected,
            payload: triple.payload,
            signature: triple.signature,
        }
    }
}

impl From<SignatureWire> for JwsTriple {
    fn from(wire: SignatureWire) -> Self {
        Self {
            protected: wire.protected,
            payload: wire.payload,
            signature: wire.signature,
        }
    }
}

/// Decrypted content produced by [`crate::decryptor::CapsaDecryptor`].
#[derive(Clone, Debug, Default)]
pub struct DecryptedCapsa {
    pub subject: Option<String>,
    pub body: Option<String>,
    pub structured: Option<serde_json::Value>,
    pub files: Vec<DecryptedFile>,
}

/// One decrypted file: its plaintext name and content bytes.
#[derive(Clone, Debug)]
pub struct DecryptedFile {
    pub filename: String,
    pub mime_type: String,
    pub content: Vec<u8>,
}
