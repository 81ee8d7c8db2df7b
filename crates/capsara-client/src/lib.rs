//! # Capsara Client SDK
//!
//! Client-side pipeline for Capsara, a zero-knowledge multi-party encrypted
//! file-exchange service: build a capsa (encrypt files and message fields
//! under a fresh master key, assemble the recipient keychain, sign the
//! result), transmit it with a retrying transport policy, and decrypt it on
//! the receiving end. The server never sees plaintext or key material.
//!
//! ## Example
//!
//! ```rust,ignore
//! use capsara_client::builder::CapsaBuilder;
//! use capsara_client::config::Limits;
//! use capsara_crypto::rsa_keys::KeyPair;
//! use bytes::Bytes;
//!
//! # async fn run() -> capsara_client::error::Result<()> {
//! let creator = KeyPair::generate()?;
//! let recipient_key_pair = KeyPair::generate()?;
//! let recipient_public = recipient_key_pair.public_key()?;
//!
//! let (upload, files) = CapsaBuilder::new("party_A", creator, Limits::default())?
//!     .with_subject("Hello")
//!     .add_recipient("party_B", recipient_public, vec!["read".to_string()])?
//!     .add_file_bytes("hello.txt", Bytes::from_static(b"Hello, World!"), None)
//!     .build()
//!     .await?;
//! # let _ = (upload, files);
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod cache;
pub mod config;
pub mod decryptor;
pub mod error;
pub mod retry;
pub mod transport;
pub mod types;

pub use builder::{CapsaBuilder, FileSource};
pub use cache::MasterKeyCache;
pub use config::Config;
pub use decryptor::CapsaDecryptor;
pub use error::{ClientError, ErrorKind, Result};
pub use retry::CancellationToken;
pub use transport::{CapsaTransport, ReqwestTransport, TransportResponse};
pub use types::*;

pub use capsara_crypto as crypto;
