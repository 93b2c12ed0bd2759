//! Blob storage for arbor.
//!
//! Blobs are opaque byte sequences addressed by a random key generated when a file is created.
//! This module provides:
//! - The [`BlobStore`] trait implemented by every backend
//! - A sharded local-directory backend, an S3 backend and an in-memory backend
//! - Signed, expiring access URLs for the local backend

mod local;
mod memory;
mod s3;
mod signer;

pub use local::LocalBlobStore;
pub use memory::MemoryBlobStore;
pub use s3::S3BlobStore;
pub use signer::UrlSigner;

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use rand::RngCore;
use thiserror::Error;

use crate::config::{StorageBackend, StorageConfig};
use crate::Result;

/// Number of random bytes in a generated blob key.
pub const BLOB_KEY_BYTES: usize = 32;

/// Maximum accepted length of a blob key.
pub const MAX_BLOB_KEY_LENGTH: usize = 128;

/// Result type for blob operations.
pub type BlobResult<T> = std::result::Result<T, BlobError>;

/// A blob's content, delivered incrementally.
pub type BlobStream = Pin<Box<dyn Stream<Item = BlobResult<Bytes>> + Send>>;

/// Errors raised by blob store backends.
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("blob not found: {key}")]
    NotFound { key: String },

    #[error("invalid blob key: {key}")]
    InvalidKey { key: String },

    /// A backend or network failure that may succeed if retried by the caller.
    #[error("transient storage error: {source}")]
    Transient {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BlobError {
    /// Create a not-found error.
    pub fn not_found(key: impl Into<String>) -> Self {
        BlobError::NotFound { key: key.into() }
    }

    /// Create a transient error from any backend error.
    pub fn transient<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        BlobError::Transient {
            source: error.into(),
        }
    }

    /// Whether the blob did not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BlobError::NotFound { .. })
    }
}

/// Key-addressed object storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `content` under `key`, replacing anything already there.
    async fn put(&self, key: &str, content: Bytes, content_type: &str) -> BlobResult<()>;

    /// Open the blob stored under `key` for streaming.
    async fn get(&self, key: &str) -> BlobResult<BlobStream>;

    /// Delete the blob stored under `key`.
    ///
    /// Backends that can tell report a missing blob as [`BlobError::NotFound`].
    async fn delete(&self, key: &str) -> BlobResult<()>;

    /// Issue a URL granting read access to `key` until `ttl` elapses.
    async fn access_url(&self, key: &str, ttl: Duration) -> BlobResult<String>;

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}

/// Generate a new blob key from a cryptographically secure RNG.
///
/// The key is the lowercase hex encoding of [`BLOB_KEY_BYTES`] random bytes.
pub fn generate_blob_key() -> String {
    let mut raw = [0u8; BLOB_KEY_BYTES];
    rand::rng().fill_bytes(&mut raw);
    to_hex(&raw)
}

/// Check that a key is safe to use as a single path segment.
pub fn validate_key(key: &str) -> BlobResult<()> {
    let valid = !key.is_empty()
        && key.len() <= MAX_BLOB_KEY_LENGTH
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        Ok(())
    } else {
        Err(BlobError::InvalidKey {
            key: key.to_string(),
        })
    }
}

pub(crate) fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Build the blob store selected by the configuration.
pub async fn open_store(config: &StorageConfig) -> Result<Arc<dyn BlobStore>> {
    let store: Arc<dyn BlobStore> = match config.backend {
        StorageBackend::Local => {
            let signer = UrlSigner::new(&config.signing_secret, &config.public_base_url)?;
            Arc::new(LocalBlobStore::new(&config.local_path, signer).await?)
        }
        StorageBackend::S3 => Arc::new(S3BlobStore::from_config(config).await?),
        StorageBackend::Memory => Arc::new(MemoryBlobStore::new()),
    };

    tracing::info!("Blob store initialized: {}", store.backend_name());
    Ok(store)
}
