//! `CapsaDecryptor`: keychain entry selection, master-key unwrap, optional
//! signature verification, and field/file decryption.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use capsara_crypto::canonical::{build_canonical_string, CapsaFileTuple};
use capsara_crypto::key::{Iv, MasterKey};
use capsara_crypto::keychain::KeychainEntry;
use capsara_crypto::rsa_keys::{KeyPair, PublicKey};
use capsara_crypto::sign::JwsTriple;
use capsara_crypto::{aead, encoding, gzip, wrap};
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use tokio::sync::Mutex as AsyncMutex;
use tracing::instrument;

use crate::cache::MasterKeyCache;
use crate::error::{ClientError, Result};
use crate::types::{CapsaUploadData, DecryptedCapsa, DecryptedFile, EncryptedBlob, EncryptedFile};

type InFlightSlot = Shared<BoxFuture<'static, Arc<Result<DecryptedCapsa>>>>;

/// Decrypts capsas for one recipient (or delegate) identity.
pub struct CapsaDecryptor {
    key_pair: KeyPair,
    creator_public_key: Option<PublicKey>,
    verify_signature: bool,
    cache: Arc<MasterKeyCache>,
    in_flight: AsyncMutex<HashMap<(String, String), InFlightSlot>>,
}

impl CapsaDecryptor {
    pub fn new(key_pair: KeyPair, cache: Arc<MasterKeyCache>) -> Self {
        Self {
            key_pair,
            creator_public_key: None,
            verify_signature: true,
            cache,
            in_flight: AsyncMutex::new(HashMap::new()),
        }
    }

    /// Supply the creator's public key, enabling signature verification.
    pub fn with_creator_public_key(mut self, public_key: PublicKey) -> Self {
        self.creator_public_key = Some(public_key);
        self
    }

    /// Opt out of signature verification (default on when a creator public
    /// key is supplied).
    pub fn with_verify_signature(mut self, verify: bool) -> Self {
        self.verify_signature = verify;
        self
    }

    fn locate_entry<'a>(&self, keychain: &'a [KeychainEntry]) -> Result<&'a KeychainEntry> {
        let fingerprint = self.key_pair.fingerprint();
        let mut direct = None;
        let mut delegate = None;
        for entry in keychain {
            if entry.fingerprint != fingerprint {
                continue;
            }
            if entry.acting_for.is_some() {
                delegate.get_or_insert(entry);
            } else {
                direct.get_or_insert(entry);
            }
        }
        direct.or(delegate).ok_or_else(|| ClientError::Validation {
            field: "keychain".to_string(),
            message: "no keychain entry matches this identity".to_string(),
        })
    }

    fn unwrap_master_key(&self, entry: &KeychainEntry) -> Result<MasterKey> {
        if entry.revoked {
            return Err(ClientError::Validation {
                field: "keychain".to_string(),
                message: "access_revoked".to_string(),
            });
        }
        let wrapped = encoding::decode(&entry.encrypted_key)?;
        let master_key = wrap::unwrap(&self.key_pair, &wrapped)?;
        Ok(master_key)
    }

    /// Rebuild the canonical string from a decrypted payload and verify its
    /// RS256 signature against the creator's public key.
    fn verify_signature(&self, payload: &CapsaUploadData) -> Result<()> {
        let Some(public_key) = &self.creator_public_key else {
            return Ok(());
        };
        if !self.verify_signature {
            return Ok(());
        }

        let file_tuples: Vec<CapsaFileTuple<'_>> = payload
            .files
            .iter()
            .map(|f| CapsaFileTuple {
                file_id: &f.file_id,
                hash_hex: &f.hash_hex,
                ciphertext_size: f.ciphertext_size,
                content_iv: &f.content.iv,
                filename_iv: &f.encrypted_filename.iv,
            })
            .collect();

        let total_ciphertext_size: u64 = payload.files.iter().map(|f| f.ciphertext_size).sum();
        let canonical = build_canonical_string(
            &payload.package_id,
            total_ciphertext_size,
            &file_tuples,
            payload.structured.as_ref().map(|b| b.iv.as_str()),
            payload.subject.as_ref().map(|b| b.iv.as_str()),
            payload.body.as_ref().map(|b| b.iv.as_str()),
        );

        let triple: JwsTriple = payload.signature.clone().into();
        let recovered = capsara_crypto::sign::verify(public_key, &triple)?;
        if recovered != canonical {
            return Err(ClientError::Validation {
                field: "signature".to_string(),
                message: "signature_invalid".to_string(),
            });
        }
        Ok(())
    }

    fn decrypt_blob(master_key: &MasterKey, blob: &EncryptedBlob) -> Result<Vec<u8>> {
        let ciphertext = encoding::decode(&blob.ciphertext)?;
        let iv = Iv::from_base64url(&blob.iv)?;
        let tag = capsara_crypto::key::AuthTag::from_base64url(&blob.tag)?;
        let plaintext = aead::decrypt(master_key, &iv, &ciphertext, &tag)?;
        Ok(plaintext)
    }

    /// Decrypt one file's name and content. `ciphertext` is the file's
    /// content ciphertext, decoded from whatever transport carried it; when
    /// the payload embeds it directly this is `encoding::decode(&file.content.ciphertext)`.
    pub fn decrypt_file(
        &self,
        master_key: &MasterKey,
        file: &EncryptedFile,
        ciphertext: &[u8],
    ) -> Result<DecryptedFile> {
        let filename_bytes = Self::decrypt_blob(master_key, &file.encrypted_filename)?;
        let filename = String::from_utf8(filename_bytes).map_err(|_| ClientError::Validation {
            field: "filename".to_string(),
            message: "decrypted filename is not valid UTF-8".to_string(),
        })?;

        let iv = Iv::from_base64url(&file.content.iv)?;
        let tag = capsara_crypto::key::AuthTag::from_base64url(&file.content.tag)?;
        let raw = aead::decrypt(master_key, &iv, ciphertext, &tag)?;
        let content = if file.compression.is_some() {
            gzip::decompress(&raw)?
        } else {
            raw
        };

        Ok(DecryptedFile {
            filename,
            mime_type: file.mime_type.clone(),
            content,
        })
    }

    /// Run the full decrypt-and-verify pipeline (locate → unwrap → verify →
    /// decrypt fields) and cache the master key under the payload's package
    /// id. File contents are not decrypted here; call [`Self::decrypt_file`]
    /// per file once its ciphertext is available.
    #[instrument(skip(self, payload), fields(package_id = %payload.package_id))]
    pub fn decrypt_capsa(&self, payload: &CapsaUploadData) -> Result<DecryptedCapsa> {
        let entry = self.locate_entry(&payload.keychain)?;
        let master_key = self.unwrap_master_key(entry)?;
        self.verify_signature(payload)?;

        let subject = match &payload.subject {
            Some(blob) => Some(
                String::from_utf8(Self::decrypt_blob(&master_key, blob)?).map_err(|_| ClientError::Validation {
                    field: "subject".to_string(),
                    message: "decrypted subject is not valid UTF-8".to_string(),
                })?,
            ),
            None => None,
        };

        let body = match &payload.body {
            Some(blob) => Some(
                String::from_utf8(Self::decrypt_blob(&master_key, blob)?).map_err(|_| ClientError::Validation {
                    field: "body".to_string(),
                    message: "decrypted body is not valid UTF-8".to_string(),
                })?,
            ),
            None => None,
        };

        let structured = match &payload.structured {
            Some(blob) => {
                let json_bytes = Self::decrypt_blob(&master_key, blob)?;
                let value: serde_json::Value =
                    serde_json::from_slice(&json_bytes).map_err(|e| ClientError::Validation {
                        field: "structured".to_string(),
                        message: e.to_string(),
                    })?;
                Some(value)
            }
            None => None,
        };

        let mut file_metadata = HashMap::new();
        for file in &payload.files {
            if let Ok(bytes) = encoding::decode(&file.content.ciphertext) {
                file_metadata.insert(file.file_id.clone(), bytes);
            }
        }
        self.cache.set(&payload.package_id, master_key, file_metadata);

        Ok(DecryptedCapsa {
            subject,
            body,
            structured,
            files: Vec::new(),
        })
    }

    /// Fetch and decrypt a capsa by id, deduplicating concurrent calls for
    /// the same `(id, identity)` pair: only the first caller runs `fetcher`
    /// and performs the RSA-OAEP unwrap; later callers await that result.
    pub async fn get_decrypted_capsa<Fut>(
        self: &Arc<Self>,
        id: &str,
        fetcher: impl FnOnce() -> Fut + Send + 'static,
    ) -> Result<DecryptedCapsa>
    where
        Fut: Future<Output = Result<CapsaUploadData>> + Send + 'static,
    {
        let key = (id.to_string(), self.key_pair.fingerprint());

        let slot = {
            let mut in_flight = self.in_flight.lock().await;
            if let Some(existing) = in_flight.get(&key) {
                existing.clone()
            } else {
                let this = Arc::clone(self);
                let fut: BoxFuture<'static, Arc<Result<DecryptedCapsa>>> = Box::pin(async move {
                    let outcome = async {
                        let payload = fetcher().await?;
                        this.decrypt_capsa(&payload)
                    }
                    .await;
                    Arc::new(outcome)
                });
                let shared = fut.shared();
                in_flight.insert(key.clone(), shared.clone());
                shared
            }
        };

        let result = slot.await;
        self.in_flight.lock().await.remove(&key);

        (*result).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::CapsaBuilder;
    use crate::config::Limits;
    use bytes::Bytes;

    async fn make_capsa_for_one_recipient() -> (CapsaUploadData, KeyPair, KeyPair, HashMap<String, Vec<u8>>) {
        let creator = KeyPair::generate().unwrap();
        let recipient = KeyPair::generate().unwrap();
        let recipient_public = recipient.public_key().unwrap();

        let builder = CapsaBuilder::new("party_A", KeyPair::from_pem(&creator.to_pem().unwrap()).unwrap(), Limits::default())
            .unwrap()
            .with_subject("Hi")
            .add_recipient("party_B", recipient_public, vec!["read".to_string()])
            .unwrap()
            .add_file_bytes("hello.txt", Bytes::from_static(b"Hello, World!"), None);

        let (upload, bodies) = builder.build().await.unwrap();
        let ciphertexts = bodies.into_iter().collect::<HashMap<_, _>>();
        (upload, creator, recipient, ciphertexts)
    }

    #[tokio::test]
    async fn recipient_decrypts_subject_and_file() {
        let (upload, _creator, recipient, ciphertexts) = make_capsa_for_one_recipient().await;
        let cache = Arc::new(MasterKeyCache::new(Default::default()));
        let decryptor = CapsaDecryptor::new(recipient, cache.clone());

        let decrypted = decryptor.decrypt_capsa(&upload).unwrap();
        assert_eq!(decrypted.subject.as_deref(), Some("Hi"));
        assert!(decrypted.structured.is_none());

        let master_key = cache.get_master_key(&upload.package_id).unwrap();
        let file = &upload.files[0];
        let ciphertext = ciphertexts.get(&file.file_id).unwrap();
        let decrypted_file = decryptor.decrypt_file(&master_key, file, ciphertext).unwrap();
        assert_eq!(decrypted_file.filename, "hello.txt");
        assert_eq!(decrypted_file.content, b"Hello, World!");
    }

    #[tokio::test]
    async fn wrong_identity_fails_to_locate_an_entry() {
        let (upload, _creator, _recipient, _ciphertexts) = make_capsa_for_one_recipient().await;
        let outsider = KeyPair::generate().unwrap();
        let cache = Arc::new(MasterKeyCache::new(Default::default()));
        let decryptor = CapsaDecryptor::new(outsider, cache);

        assert!(decryptor.decrypt_capsa(&upload).is_err());
    }

    #[tokio::test]
    async fn revoked_entry_is_rejected() {
        let (mut upload, _creator, recipient, _ciphertexts) = make_capsa_for_one_recipient().await;
        for entry in upload.keychain.iter_mut() {
            if entry.party_id == "party_B" {
                entry.revoked = true;
            }
        }
        let cache = Arc::new(MasterKeyCache::new(Default::default()));
        let decryptor = CapsaDecryptor::new(recipient, cache);

        let err = decryptor.decrypt_capsa(&upload).unwrap_err();
        assert!(matches!(err, ClientError::Validation { .. }));
    }

    #[tokio::test]
    async fn signature_verification_detects_tampering() {
        let (mut upload, creator, recipient, _ciphertexts) = make_capsa_for_one_recipient().await;
        let creator_public = creator.public_key().unwrap();
        upload.signature.signature.push('x');

        let cache = Arc::new(MasterKeyCache::new(Default::default()));
        let decryptor = CapsaDecryptor::new(recipient, cache).with_creator_public_key(creator_public);

        assert!(decryptor.decrypt_capsa(&upload).is_err());
    }

    #[tokio::test]
    async fn signature_verification_can_be_disabled() {
        let (mut upload, creator, recipient, _ciphertexts) = make_capsa_for_one_recipient().await;
        let creator_public = creator.public_key().unwrap();
        upload.signature.signature.push('x');

        let cache = Arc::new(MasterKeyCache::new(Default::default()));
        let decryptor = CapsaDecryptor::new(recipient, cache)
            .with_creator_public_key(creator_public)
            .with_verify_signature(false);

        assert!(decryptor.decrypt_capsa(&upload).is_ok());
    }

    #[tokio::test]
    async fn tampered_file_ciphertext_fails_to_decrypt() {
        let (upload, _creator, recipient, ciphertexts) = make_capsa_for_one_recipient().await;
        let cache = Arc::new(MasterKeyCache::new(Default::default()));
        let decryptor = CapsaDecryptor::new(recipient, cache.clone());
        decryptor.decrypt_capsa(&upload).unwrap();
        let master_key = cache.get_master_key(&upload.package_id).unwrap();

        let file = &upload.files[0];
        let mut tampered = ciphertexts.get(&file.file_id).unwrap().clone();
        tampered[0] ^= 0xFF;

        assert!(decryptor.decrypt_file(&master_key, file, &tampered).is_err());
    }

    #[tokio::test]
    async fn concurrent_get_decrypted_capsa_calls_dedup_and_each_caller_gets_its_own_result() {
        let (upload, _creator, recipient, _ciphertexts) = make_capsa_for_one_recipient().await;
        let cache = Arc::new(MasterKeyCache::new(Default::default()));
        let decryptor = Arc::new(CapsaDecryptor::new(recipient, cache));
        let fetch_count = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        // The fetcher sleeps before resolving so the other 4 callers reach
        // `get_decrypted_capsa` and join the same in-flight slot instead of
        // each racing ahead to its own independent fetch.
        let mut handles = Vec::new();
        for _ in 0..5 {
            let decryptor = Arc::clone(&decryptor);
            let upload = upload.clone();
            let fetch_count = Arc::clone(&fetch_count);
            handles.push(tokio::spawn(async move {
                decryptor
                    .get_decrypted_capsa(&upload.package_id.clone(), move || {
                        fetch_count.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                        async move {
                            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                            Ok(upload)
                        }
                    })
                    .await
            }));
        }

        for handle in handles {
            let decrypted = handle.await.unwrap().unwrap();
            assert_eq!(decrypted.subject.as_deref(), Some("Hi"));
        }

        assert_eq!(fetch_count.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
