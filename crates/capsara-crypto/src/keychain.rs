//! Keychain assembly: turning a master key, a recipient list, and a set of
//! party-key records into the per-party wrapped-key entries signed into a
//! capsa.

use serde::{Deserialize, Serialize};

use crate::key::{Iv, MasterKey};
use crate::rsa_keys::PublicKey;
use crate::wrap;
use crate::{CryptoError, Result};

/// Maximum number of parties a single delegate may act for.
pub const MAX_ACTING_FOR: usize = 10;

/// Maximum combined size of the keychain (creator + recipients + delegates).
pub const MAX_KEYCHAIN_SIZE: usize = 100;

/// The `isDelegate` wire field's three shapes: missing/null is represented
/// by the surrounding `Option`, so only the two present shapes live here.
/// `true` and an empty array both mean "delegate of no one in particular";
/// the codec normalizes `true` to an empty list on read and serializes an
/// empty list back as `true`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DelegateSpec {
    Flag(bool),
    PartyIds(Vec<String>),
}

impl DelegateSpec {
    fn party_ids(&self) -> Vec<String> {
        match self {
            DelegateSpec::Flag(_) => Vec::new(),
            DelegateSpec::PartyIds(ids) => ids.clone(),
        }
    }
}

/// One entry in the caller-supplied list of parties with a public key on
/// file: a potential creator, recipient, or delegate.
#[derive(Clone)]
pub struct PartyKeyRecord {
    pub party_id: String,
    pub public_key: PublicKey,
    pub is_delegate: Option<DelegateSpec>,
}

/// A recipient explicitly added to the capsa, with its permissions.
#[derive(Clone)]
pub struct Recipient {
    pub party_id: String,
    pub permissions: Vec<String>,
    /// True if this recipient is represented by a delegate and must not
    /// receive a direct wrapped key of its own.
    pub delegated: bool,
}

/// One assembled keychain entry, ready to be serialized onto the wire.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeychainEntry {
    pub party_id: String,
    /// Base64url RSA-OAEP-wrapped master key, or empty for a delegated
    /// recipient who must not receive a direct unwrap.
    pub encrypted_key: String,
    /// Base64url IV. For a delegated recipient this IV wraps nothing; it
    /// exists solely so the entry still contributes a unique value to the
    /// capsa-wide IV uniqueness check.
    pub iv: String,
    pub fingerprint: String,
    pub permissions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acting_for: Option<Vec<String>>,
    pub revoked: bool,
}

/// Assemble the keychain for a capsa.
///
/// `party_keys` is the full candidate list (creator, recipients, and
/// delegates alike); `creator_party_id` and `recipients` determine which
/// candidates actually receive an entry and with what permissions.
pub fn assemble_keychain(
    master_key: &MasterKey,
    creator_party_id: &str,
    recipients: &[Recipient],
    party_keys: &[PartyKeyRecord],
) -> Result<Vec<KeychainEntry>> {
    let recipient_ids: Vec<&str> = recipients.iter().map(|r| r.party_id.as_str()).collect();
    let mut entries = Vec::new();

    for record in party_keys {
        if let Some(spec) = &record.is_delegate {
            let acting_for: Vec<String> = spec
                .party_ids()
                .into_iter()
                .filter(|id| recipient_ids.contains(&id.as_str()))
                .collect();

            if acting_for.is_empty() {
                continue;
            }
            if acting_for.len() > MAX_ACTING_FOR {
                return Err(CryptoError::TooManyActingFor {
                    party_id: record.party_id.clone(),
                    count: acting_for.len(),
                    limit: MAX_ACTING_FOR,
                });
            }

            entries.push(build_entry(
                master_key,
                record,
                vec!["delegate".to_string()],
                Some(acting_for),
            )?);
        } else if record.party_id == creator_party_id {
            entries.push(build_entry(master_key, record, Vec::new(), None)?);
        } else if let Some(recipient) = recipients.iter().find(|r| r.party_id == record.party_id) {
            if recipient.delegated {
                entries.push(build_delegated_recipient_entry(record)?);
            } else {
                let perms = if recipient.permissions.is_empty() {
                    vec!["read".to_string()]
                } else {
                    recipient.permissions.clone()
                };
                entries.push(build_entry(master_key, record, perms, None)?);
            }
        }
    }

    if entries.len() > MAX_KEYCHAIN_SIZE {
        return Err(CryptoError::InvalidKey(format!(
            "keychain has {} entries, limit is {}",
            entries.len(),
            MAX_KEYCHAIN_SIZE
        )));
    }

    Ok(entries)
}

fn build_entry(
    master_key: &MasterKey,
    record: &PartyKeyRecord,
    permissions: Vec<String>,
    acting_for: Option<Vec<String>>,
) -> Result<KeychainEntry> {
    let wrapped = wrap::wrap(&record.public_key, master_key)?;
    Ok(KeychainEntry {
        party_id: record.party_id.clone(),
        encrypted_key: crate::encoding::encode(wrapped),
        iv: Iv::generate().to_base64url(),
        fingerprint: record.public_key.fingerprint(),
        permissions,
        acting_for,
        revoked: false,
    })
}

fn build_delegated_recipient_entry(record: &PartyKeyRecord) -> Result<KeychainEntry> {
    Ok(KeychainEntry {
        party_id: record.party_id.clone(),
        encrypted_key: String::new(),
        iv: Iv::generate().to_base64url(),
        fingerprint: record.public_key.fingerprint(),
        permissions: vec!["read".to_string()],
        acting_for: None,
        revoked: false,
    })
}
