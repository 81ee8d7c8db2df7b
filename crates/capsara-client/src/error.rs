//! Client error types.

use thiserror::Error;
use tracing::debug;

/// Result type alias using [`ClientError`].
pub type Result<T> = std::result::Result<T, ClientError>;

/// Machine-readable error category, shared by local and server-raised errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    CryptoFailure,
    CsprngFailure,
    Transport,
    ServerError,
    Cancelled,
    Disposed,
}

/// Client errors.
#[derive(Error, Debug, Clone)]
pub enum ClientError {
    /// Input exceeded a limit or was malformed.
    #[error("validation error: {field} — {message}")]
    Validation { field: String, message: String },

    /// A primitive operation in `capsara-crypto` failed.
    #[error("crypto failure: {0}")]
    CryptoFailure(#[from] capsara_crypto::CryptoError),

    /// Duplicate IV detected within a single capsa; fatal, never transmit.
    #[error("csprng failure: duplicate IV detected ({context})")]
    CsprngFailure { context: String },

    /// Network I/O or HTTP 5xx/429, retried per the configured retry policy.
    #[error("transport error: {0}")]
    Transport(String),

    /// A non-retryable HTTP 4xx the server identified with a known code.
    #[error("server error ({code}): {message}")]
    ServerError {
        code: String,
        message: String,
        kind: ErrorKind,
    },

    /// The caller's cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,

    /// Called a builder or cache after it was disposed.
    #[error("operation attempted after disposal")]
    Disposed,
}

impl ClientError {
    /// Classify this error's abstract kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Validation { .. } => ErrorKind::Validation,
            ClientError::CryptoFailure(_) => ErrorKind::CryptoFailure,
            ClientError::CsprngFailure { .. } => ErrorKind::CsprngFailure,
            ClientError::Transport(_) => ErrorKind::Transport,
            ClientError::ServerError { kind, .. } => *kind,
            ClientError::Cancelled => ErrorKind::Cancelled,
            ClientError::Disposed => ErrorKind::Disposed,
        }
    }

    /// Whether this error should be retried by the transport policy.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transport)
    }

    /// Build a [`ClientError::ServerError`] from an inbound error envelope's
    /// `code` field, accepting both the current `CAPSA_*` family and the
    /// legacy `ENVELOPE_*` family emitted by older servers.
    pub fn from_envelope(code: &str, message: &str) -> Self {
        let normalized = if let Some(suffix) = code.strip_prefix("ENVELOPE_") {
            debug!(legacy_code = code, "mapping legacy ENVELOPE_* error code");
            format!("CAPSA_{suffix}")
        } else {
            code.to_string()
        };

        let kind = ErrorKind::ServerError;

        ClientError::ServerError {
            code: normalized,
            message: message.to_string(),
            kind,
        }
    }
}
