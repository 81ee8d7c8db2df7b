//! `CapsaBuilder`: fluent construction, validation, and the deterministic
//! build algorithm that turns builder state into a signed, encrypted payload.

use std::collections::HashSet;
use std::path::PathBuf;

use bytes::Bytes;
use capsara_crypto::canonical::{build_canonical_string, CapsaFileTuple};
use capsara_crypto::ids::{generate_file_id, generate_package_id};
use capsara_crypto::key::{Iv, MasterKey};
use capsara_crypto::keychain::{assemble_keychain, PartyKeyRecord, Recipient as KeychainRecipient};
use capsara_crypto::rsa_keys::KeyPair;
use capsara_crypto::{aead, gzip, hash, sign};
use chrono::{DateTime, Timelike, Utc};
use tokio::io::AsyncRead;
use tracing::instrument;

use crate::config::Limits;
use crate::error::{ClientError, Result};
use crate::types::{
    AccessControl, CapsaMetadata, CapsaUploadData, CompressionInfo, EncryptedBlob, EncryptedFile,
    Priority,
};

/// A file input to the builder, in one of three shapes.
pub enum FileSource {
    Path(PathBuf),
    Bytes(Bytes),
    /// A streamed reader and its declared length, so limit checks run
    /// before any byte is read.
    Stream(Box<dyn AsyncRead + Send + Unpin>, u64),
}

struct PendingFile {
    filename: String,
    source: FileSource,
    mime_type: Option<String>,
}

/// Builder for one capsa: subject, body, structured fields, recipients, and
/// files, assembled and encrypted by [`CapsaBuilder::build`].
pub struct CapsaBuilder {
    creator_party_id: String,
    creator_key_pair: KeyPair,
    limits: Limits,
    subject: Option<String>,
    body: Option<String>,
    structured: Option<serde_json::Value>,
    expires_at: Option<DateTime<Utc>>,
    priority: Priority,
    recipients: Vec<KeychainRecipient>,
    party_keys: Vec<PartyKeyRecord>,
    files: Vec<PendingFile>,
    metadata: CapsaMetadata,
    disabled_compression: bool,
    disposed: bool,
}

impl CapsaBuilder {
    pub fn new(creator_party_id: impl Into<String>, creator_key_pair: KeyPair, limits: Limits) -> Result<Self> {
        let creator_party_id = creator_party_id.into();
        if creator_party_id.is_empty() || creator_party_id.len() > limits.max_party_id_len {
            return Err(ClientError::Validation {
                field: "creator_party_id".to_string(),
                message: format!("must be 1..={} chars", limits.max_party_id_len),
            });
        }
        let creator_public_key = creator_key_pair.public_key()?;
        let party_keys = vec![PartyKeyRecord {
            party_id: creator_party_id.clone(),
            public_key: creator_public_key,
            is_delegate: None,
        }];
        Ok(Self {
            creator_party_id,
            creator_key_pair,
            limits,
            subject: None,
            body: None,
            structured: None,
            expires_at: None,
            priority: Priority::Normal,
            recipients: Vec::new(),
            party_keys,
            files: Vec::new(),
            metadata: CapsaMetadata::default(),
            disabled_compression: false,
            disposed: false,
        })
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_structured(mut self, value: serde_json::Value) -> Self {
        self.structured = Some(value);
        self
    }

    /// Expiration is truncated to minute granularity.
    pub fn with_expiration(mut self, expires_at: DateTime<Utc>) -> Self {
        let truncated = expires_at
            .date_naive()
            .and_hms_opt(expires_at.hour(), expires_at.minute(), 0)
            .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
            .unwrap_or(expires_at);
        self.expires_at = Some(truncated);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_metadata(mut self, metadata: CapsaMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn disable_compression(mut self) -> Self {
        self.disabled_compression = true;
        self
    }

    /// Add a recipient with the given permissions (default `["read"]` when
    /// empty) and their public key on file.
    pub fn add_recipient(
        mut self,
        party_id: impl Into<String>,
        public_key: capsara_crypto::rsa_keys::PublicKey,
        permissions: Vec<String>,
    ) -> Result<Self> {
        let party_id = party_id.into();
        self.validate_party_id(&party_id)?;
        self.recipients.push(KeychainRecipient {
            party_id: party_id.clone(),
            permissions,
            delegated: false,
        });
        self.party_keys.push(PartyKeyRecord {
            party_id,
            public_key,
            is_delegate: None,
        });
        self.check_keychain_size()?;
        Ok(self)
    }

    /// Add a recipient represented by a delegate: they still get a
    /// keychain entry (for uniqueness/audit) but no direct wrapped key.
    pub fn add_delegated_recipient(
        mut self,
        party_id: impl Into<String>,
        public_key: capsara_crypto::rsa_keys::PublicKey,
    ) -> Result<Self> {
        let party_id = party_id.into();
        self.validate_party_id(&party_id)?;
        self.recipients.push(KeychainRecipient {
            party_id: party_id.clone(),
            permissions: Vec::new(),
            delegated: true,
        });
        self.party_keys.push(PartyKeyRecord {
            party_id,
            public_key,
            is_delegate: None,
        });
        self.check_keychain_size()?;
        Ok(self)
    }

    /// Add a delegate's key, authorized to act for the given subset of
    /// current recipients (intersected again at build time).
    pub fn add_delegate(
        mut self,
        party_id: impl Into<String>,
        public_key: capsara_crypto::rsa_keys::PublicKey,
        acting_for: Vec<String>,
    ) -> Result<Self> {
        let party_id = party_id.into();
        self.validate_party_id(&party_id)?;
        if acting_for.len() > self.limits.max_acting_for {
            return Err(ClientError::Validation {
                field: "acting_for".to_string(),
                message: format!("at most {} parties per delegate", self.limits.max_acting_for),
            });
        }
        self.party_keys.push(PartyKeyRecord {
            party_id,
            public_key,
            is_delegate: Some(capsara_crypto::keychain::DelegateSpec::PartyIds(acting_for)),
        });
        self.check_keychain_size()?;
        Ok(self)
    }

    pub fn add_file_path(mut self, path: PathBuf, mime_type: Option<String>) -> Self {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.files.push(PendingFile {
            filename,
            source: FileSource::Path(path),
            mime_type,
        });
        self
    }

    pub fn add_file_bytes(mut self, filename: impl Into<String>, data: Bytes, mime_type: Option<String>) -> Self {
        self.files.push(PendingFile {
            filename: filename.into(),
            source: FileSource::Bytes(data),
            mime_type,
        });
        self
    }

    pub fn add_file_stream(
        mut self,
        filename: impl Into<String>,
        reader: Box<dyn AsyncRead + Send + Unpin>,
        declared_len: u64,
        mime_type: Option<String>,
    ) -> Self {
        self.files.push(PendingFile {
            filename: filename.into(),
            source: FileSource::Stream(reader, declared_len),
            mime_type,
        });
        self
    }

    fn validate_party_id(&self, party_id: &str) -> Result<()> {
        if party_id.is_empty() || party_id.len() > self.limits.max_party_id_len {
            return Err(ClientError::Validation {
                field: "party_id".to_string(),
                message: format!("must be 1..={} chars", self.limits.max_party_id_len),
            });
        }
        Ok(())
    }

    fn validate_metadata(&self) -> Result<()> {
        if let Some(label) = &self.metadata.label {
            if label.len() > self.limits.max_metadata_label_len {
                return Err(ClientError::Validation {
                    field: "metadata.label".to_string(),
                    message: format!("exceeds limit of {} chars", self.limits.max_metadata_label_len),
                });
            }
        }
        if self.metadata.tags.len() > self.limits.max_metadata_tags {
            return Err(ClientError::Validation {
                field: "metadata.tags".to_string(),
                message: format!("at most {} tags", self.limits.max_metadata_tags),
            });
        }
        if let Some(tag) = self
            .metadata
            .tags
            .iter()
            .find(|t| t.len() > self.limits.max_metadata_tag_len)
        {
            return Err(ClientError::Validation {
                field: "metadata.tags".to_string(),
                message: format!(
                    "tag {tag:?} exceeds limit of {} chars",
                    self.limits.max_metadata_tag_len
                ),
            });
        }
        if let Some(notes) = &self.metadata.notes {
            if notes.len() > self.limits.max_metadata_notes_len {
                return Err(ClientError::Validation {
                    field: "metadata.notes".to_string(),
                    message: format!("exceeds limit of {} chars", self.limits.max_metadata_notes_len),
                });
            }
        }
        if self.metadata.related_packages.len() > self.limits.max_related_packages {
            return Err(ClientError::Validation {
                field: "metadata.related_packages".to_string(),
                message: format!("at most {} related packages", self.limits.max_related_packages),
            });
        }
        Ok(())
    }

    fn check_keychain_size(&self) -> Result<()> {
        if self.party_keys.len() > self.limits.max_keychain_size {
            return Err(ClientError::Validation {
                field: "keychain".to_string(),
                message: format!("at most {} parties", self.limits.max_keychain_size),
            });
        }
        Ok(())
    }

    async fn read_file_bytes(source: FileSource, limit: u64) -> Result<Vec<u8>> {
        match source {
            FileSource::Bytes(bytes) => {
                if bytes.len() as u64 > limit {
                    return Err(ClientError::Validation {
                        field: "file".to_string(),
                        message: format!("exceeds per-file limit of {limit} bytes"),
                    });
                }
                Ok(bytes.to_vec())
            }
            FileSource::Path(path) => {
                let data = tokio::fs::read(&path).await.map_err(|e| ClientError::Validation {
                    field: "file".to_string(),
                    message: e.to_string(),
                })?;
                if data.len() as u64 > limit {
                    return Err(ClientError::Validation {
                        field: "file".to_string(),
                        message: format!("exceeds per-file limit of {limit} bytes"),
                    });
                }
                Ok(data)
            }
            FileSource::Stream(mut reader, declared_len) => {
                if declared_len > limit {
                    return Err(ClientError::Validation {
                        field: "file".to_string(),
                        message: format!("declared length exceeds per-file limit of {limit} bytes"),
                    });
                }
                use tokio::io::AsyncReadExt;
                let mut buffer = Vec::with_capacity(declared_len as usize);
                reader
                    .read_to_end(&mut buffer)
                    .await
                    .map_err(|e| ClientError::Validation {
                        field: "file".to_string(),
                        message: e.to_string(),
                    })?;
                Ok(buffer)
            }
        }
    }

    fn detect_mime_type(filename: &str, declared: Option<String>) -> String {
        if let Some(mime) = declared {
            return mime;
        }
        match filename.rsplit('.').next() {
            Some("txt") => "text/plain",
            Some("json") => "application/json",
            Some("png") => "image/png",
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("pdf") => "application/pdf",
            _ => "application/octet-stream",
        }
        .to_string()
    }

    /// Run the build algorithm: encrypt every file and field, assemble the
    /// keychain, build the canonical string, and sign it.
    #[instrument(skip(self), fields(party_id = %self.creator_party_id))]
    pub async fn build(mut self) -> Result<(CapsaUploadData, Vec<(String, Vec<u8>)>)> {
        if self.disposed {
            return Err(ClientError::Disposed);
        }
        if self.files.is_empty() && self.subject.is_none() && self.body.is_none() {
            return Err(ClientError::Validation {
                field: "capsa".to_string(),
                message: "at least one file, subject, or body is required".to_string(),
            });
        }
        self.validate_metadata()?;

        let master_key = MasterKey::generate();
        let mut seen_ivs: HashSet<[u8; 12]> = HashSet::new();
        let mut record_iv = |iv: &Iv| -> Result<()> {
            if !seen_ivs.insert(*iv.as_bytes()) {
                return Err(ClientError::CsprngFailure {
                    context: "duplicate IV within one capsa".to_string(),
                });
            }
            Ok(())
        };

        let mut encrypted_files = Vec::new();
        let mut ciphertext_bodies = Vec::new();
        let mut total_ciphertext_size: u64 = 0;

        let pending_files = std::mem::take(&mut self.files);
        for pending in pending_files {
            let raw = Self::read_file_bytes(pending.source, self.limits.max_file_size).await?;

            let (payload, compression) = if !self.disabled_compression {
                match gzip::maybe_compress(&raw)? {
                    Some(compressed) => (
                        compressed,
                        Some(CompressionInfo {
                            algorithm: "gzip".to_string(),
                            original_size: raw.len() as u64,
                        }),
                    ),
                    None => (raw.clone(), None),
                }
            } else {
                (raw.clone(), None)
            };

            let content_iv = Iv::generate();
            record_iv(&content_iv)?;
            let (content_ciphertext, content_tag) = aead::encrypt(&master_key, &content_iv, &payload)?;
            let hash_hex = hash::sha256_hex(&content_ciphertext);

            let filename_iv = Iv::generate();
            record_iv(&filename_iv)?;
            let (filename_ciphertext, filename_tag) =
                aead::encrypt(&master_key, &filename_iv, pending.filename.as_bytes())?;
            let encrypted_filename = capsara_crypto::encoding::encode(&filename_ciphertext);
            if encrypted_filename.len() > self.limits.max_encrypted_filename_len {
                return Err(ClientError::Validation {
                    field: "filename".to_string(),
                    message: format!("exceeds limit of {} chars", self.limits.max_encrypted_filename_len),
                });
            }

            let file_id = generate_file_id();
            total_ciphertext_size += content_ciphertext.len() as u64;

            if total_ciphertext_size > self.limits.max_total_size {
                return Err(ClientError::Validation {
                    field: "files".to_string(),
                    message: format!("total size exceeds limit of {} bytes", self.limits.max_total_size),
                });
            }

            let mime_type = Self::detect_mime_type(&pending.filename, pending.mime_type);

            ciphertext_bodies.push((file_id.clone(), content_ciphertext.clone()));
            encrypted_files.push((
                EncryptedFile {
                    file_id,
                    encrypted_filename: EncryptedBlob {
                        ciphertext: encrypted_filename,
                        iv: filename_iv.to_base64url(),
                        tag: filename_tag.to_base64url(),
                    },
                    content: EncryptedBlob {
                        ciphertext: capsara_crypto::encoding::encode(&content_ciphertext),
                        iv: content_iv.to_base64url(),
                        tag: content_tag.to_base64url(),
                    },
                    mime_type,
                    ciphertext_size: content_ciphertext.len() as u64,
                    hash_hex,
                    hash_algorithm: "SHA-256".to_string(),
                    compression,
                    expires_at: None,
                    one_way_transform_ref: None,
                },
                content_iv,
                filename_iv,
            ));
        }

        let encrypt_field = |plaintext: &str, master_key: &MasterKey| -> Result<(EncryptedBlob, Iv)> {
            let iv = Iv::generate();
            let (ciphertext, tag) = aead::encrypt(master_key, &iv, plaintext.as_bytes())?;
            Ok((
                EncryptedBlob {
                    ciphertext: capsara_crypto::encoding::encode(&ciphertext),
                    iv: iv.to_base64url(),
                    tag: tag.to_base64url(),
                },
                iv,
            ))
        };

        let subject_result = match &self.subject {
            Some(s) => {
                if s.len() > self.limits.max_encrypted_subject_len {
                    return Err(ClientError::Validation {
                        field: "subject".to_string(),
                        message: format!("exceeds limit of {} chars", self.limits.max_encrypted_subject_len),
                    });
                }
                let (blob, iv) = encrypt_field(s, &master_key)?;
                record_iv(&iv)?;
                Some(blob)
            }
            None => None,
        };

        let body_result = match &self.body {
            Some(b) => {
                if b.len() > self.limits.max_encrypted_body_len {
                    return Err(ClientError::Validation {
                        field: "body".to_string(),
                        message: format!("exceeds limit of {} chars", self.limits.max_encrypted_body_len),
                    });
                }
                let (blob, iv) = encrypt_field(b, &master_key)?;
                record_iv(&iv)?;
                Some(blob)
            }
            None => None,
        };

        let structured_result = match &self.structured {
            Some(v) => {
                let json = serde_json::to_string(v).map_err(|e| ClientError::Validation {
                    field: "structured".to_string(),
                    message: e.to_string(),
                })?;
                if json.len() > self.limits.max_encrypted_structured_len {
                    return Err(ClientError::Validation {
                        field: "structured".to_string(),
                        message: format!("exceeds limit of {} chars", self.limits.max_encrypted_structured_len),
                    });
                }
                let (blob, iv) = encrypt_field(&json, &master_key)?;
                record_iv(&iv)?;
                Some(blob)
            }
            None => None,
        };

        let keychain = assemble_keychain(
            &master_key,
            &self.creator_party_id,
            &self.recipients,
            &self.party_keys,
        )?;
        for entry in &keychain {
            let iv = Iv::from_base64url(&entry.iv)?;
            record_iv(&iv)?;
        }

        let package_id = generate_package_id();
        let file_iv_strings: Vec<(String, String)> = encrypted_files
            .iter()
            .map(|(_, content_iv, filename_iv)| (content_iv.to_base64url(), filename_iv.to_base64url()))
            .collect();
        let file_tuples: Vec<CapsaFileTuple<'_>> = encrypted_files
            .iter()
            .zip(file_iv_strings.iter())
            .map(|((file, _, _), (content_iv, filename_iv))| CapsaFileTuple {
                file_id: &file.file_id,
                hash_hex: &file.hash_hex,
                ciphertext_size: file.ciphertext_size,
                content_iv,
                filename_iv,
            })
            .collect();

        let canonical = build_canonical_string(
            &package_id,
            total_ciphertext_size,
            &file_tuples,
            structured_result.as_ref().map(|b| b.iv.as_str()),
            subject_result.as_ref().map(|b| b.iv.as_str()),
            body_result.as_ref().map(|b| b.iv.as_str()),
        );

        if canonical.len() > self.limits.max_signature_payload_len {
            return Err(ClientError::Validation {
                field: "signature_payload".to_string(),
                message: format!("exceeds limit of {} chars", self.limits.max_signature_payload_len),
            });
        }

        let jws = sign::sign(&self.creator_key_pair, &canonical)?;

        let upload = CapsaUploadData {
            package_id,
            keychain,
            signature: jws.into(),
            access_control: AccessControl {
                expires_at: self.expires_at,
            },
            priority: self.priority,
            files: encrypted_files.into_iter().map(|(f, _, _)| f).collect(),
            subject: subject_result,
            body: body_result,
            structured: structured_result,
            metadata: Some(self.metadata.clone()),
        };

        self.disposed = true;

        Ok((upload, ciphertext_bodies))
    }
}
