//! Client configuration: transport defaults, validation limits, retry policy,
//! and master-key cache sizing.

use std::time::Duration;

/// Builder/decryptor validation limits (§4.3 validation gates).
#[derive(Clone, Debug)]
pub struct Limits {
    pub max_party_id_len: usize,
    pub max_keychain_size: usize,
    pub max_file_size: u64,
    pub max_total_size: u64,
    pub max_encrypted_filename_len: usize,
    pub max_encrypted_subject_len: usize,
    pub max_encrypted_body_len: usize,
    pub max_encrypted_structured_len: usize,
    pub max_signature_payload_len: usize,
    pub max_metadata_label_len: usize,
    pub max_metadata_tags: usize,
    pub max_metadata_tag_len: usize,
    pub max_metadata_notes_len: usize,
    pub max_related_packages: usize,
    pub max_acting_for: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_party_id_len: 100,
            max_keychain_size: 100,
            max_file_size: 5 * 1024 * 1024 * 1024,
            max_total_size: 20 * 1024 * 1024 * 1024,
            max_encrypted_filename_len: 2048,
            max_encrypted_subject_len: 65_536,
            max_encrypted_body_len: 1_048_576,
            max_encrypted_structured_len: 1_048_576,
            max_signature_payload_len: 65_536,
            max_metadata_label_len: 512,
            max_metadata_tags: 100,
            max_metadata_tag_len: 100,
            max_metadata_notes_len: 10_240,
            max_related_packages: 50,
            max_acting_for: 10,
        }
    }
}

/// Exponential-backoff-with-jitter retry policy (§4.7).
#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Master-key cache sizing (§4.6).
#[derive(Clone, Debug)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(5 * 60),
            max_entries: 100,
        }
    }
}

/// Top-level client configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub endpoint: String,
    pub access_token: Option<String>,
    pub timeout: Duration,
    pub user_agent: String,
    pub limits: Limits,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: "https://api.capsara.example".to_string(),
            access_token: None,
            timeout: Duration::from_secs(30),
            user_agent: format!("capsara-client/{}", env!("CARGO_PKG_VERSION")),
            limits: Limits::default(),
            retry: RetryConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl Config {
    /// Create a new config with the given endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Set the access token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Override the master-key cache sizing.
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }
}
