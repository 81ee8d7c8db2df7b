//! Process-local master-key cache: single-mutex, TTL + LRU, copy-out-only.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use capsara_crypto::MasterKey;
use parking_lot::Mutex;

use crate::config::CacheConfig;

struct CacheEntry {
    master_key: MasterKey,
    file_metadata: HashMap<String, Vec<u8>>,
    created_at: Instant,
}

/// A mapping from package identifier to cached master key and per-file
/// metadata, with TTL expiry and oldest-first LRU eviction.
///
/// All operations are serialized under one mutex: the cache is the only
/// core state shared across concurrent builds/decrypts. Every read returns
/// an owned copy of the master key; the caller is responsible for wiping
/// its copy when done, and the cache never hands out a reference into its
/// own storage.
pub struct MasterKeyCache {
    config: CacheConfig,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MasterKeyCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Store a master key and its associated file metadata, replacing (and
    /// wiping) any prior entry for this package, then evicting the oldest
    /// entries until the cache is back under its size limit.
    pub fn set(&self, package_id: &str, master_key: MasterKey, file_metadata: HashMap<String, Vec<u8>>) {
        let mut entries = self.entries.lock();
        entries.insert(
            package_id.to_string(),
            CacheEntry {
                master_key,
                file_metadata,
                created_at: Instant::now(),
            },
        );
        Self::evict_to_capacity(&mut entries, self.config.max_entries);
    }

    /// Return an owned copy of the cached master key, or `None` if absent
    /// or expired. Expiry removes the entry (wiping it) as a side effect.
    pub fn get_master_key(&self, package_id: &str) -> Option<MasterKey> {
        let mut entries = self.entries.lock();
        self.expire_if_stale(&mut entries, package_id);
        entries.get(package_id).map(|e| e.master_key.clone())
    }

    /// Return the cached metadata for one file within a package, subject to
    /// the same expiry rule as [`Self::get_master_key`].
    pub fn get_file_metadata(&self, package_id: &str, file_id: &str) -> Option<Vec<u8>> {
        let mut entries = self.entries.lock();
        self.expire_if_stale(&mut entries, package_id);
        entries
            .get(package_id)
            .and_then(|e| e.file_metadata.get(file_id))
            .cloned()
    }

    /// Remove and wipe a single package's entry.
    pub fn clear(&self, package_id: &str) {
        self.entries.lock().remove(package_id);
    }

    /// Remove and wipe every entry.
    pub fn clear_all(&self) {
        self.entries.lock().clear();
    }

    /// Remove and wipe every entry older than the configured TTL.
    pub fn prune(&self) {
        let mut entries = self.entries.lock();
        let ttl = self.config.ttl;
        entries.retain(|_, entry| entry.created_at.elapsed() < ttl);
    }

    /// Number of live (not yet pruned) entries. Exposed for tests.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn expire_if_stale(&self, entries: &mut HashMap<String, CacheEntry>, package_id: &str) {
        let expired = entries
            .get(package_id)
            .map(|e| e.created_at.elapsed() >= self.config.ttl)
            .unwrap_or(false);
        if expired {
            entries.remove(package_id);
        }
    }

    fn evict_to_capacity(entries: &mut HashMap<String, CacheEntry>, max_entries: usize) {
        while entries.len() > max_entries {
            let oldest_key = entries
                .iter()
                .min_by_key(|(_, e)| e.created_at)
                .map(|(k, _)| k.clone());
            match oldest_key {
                Some(key) => {
                    entries.remove(&key);
                }
                None => break,
            }
        }
    }
}
