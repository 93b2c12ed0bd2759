//! Local directory blob storage.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use super::{validate_key, BlobError, BlobResult, BlobStore, BlobStream, UrlSigner};

/// Read chunk size for streaming blobs off disk.
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Blob store backed by a local directory.
///
/// Blobs are stored in a sharded directory structure:
/// ```text
/// {base_path}/
/// ├── ab/
/// │   └── ab12cd34...
/// ├── cd/
/// │   └── cd90ab12...
/// └── .tmp/
/// ```
/// Writes land in `.tmp` first and are renamed into place once synced.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    /// Base directory for blob storage.
    base_path: PathBuf,
    signer: UrlSigner,
}

impl LocalBlobStore {
    /// Create a new LocalBlobStore rooted at the given path.
    ///
    /// The base directory will be created if it doesn't exist.
    pub async fn new(base_path: impl Into<PathBuf>, signer: UrlSigner) -> io::Result<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(base_path.join(".tmp")).await?;

        Ok(Self { base_path, signer })
    }

    /// Get the full file path for a key.
    ///
    /// The path is constructed as: {base_path}/{shard}/{key}
    fn get_file_path(&self, key: &str) -> PathBuf {
        self.base_path.join(Self::get_shard(key)).join(key)
    }

    /// Shard directory name for a key: its first 2 characters.
    fn get_shard(key: &str) -> &str {
        if key.len() >= 2 {
            &key[..2]
        } else {
            key
        }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, key: &str, content: Bytes, _content_type: &str) -> BlobResult<()> {
        validate_key(key)?;
        let file_path = self.get_file_path(key);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let tmp_path = self.base_path.join(".tmp").join(Uuid::new_v4().to_string());
        let mut file = fs::File::create(&tmp_path).await?;
        let written = async {
            file.write_all(&content).await?;
            file.sync_all().await
        }
        .await;

        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }

        fs::rename(&tmp_path, &file_path).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> BlobResult<BlobStream> {
        validate_key(key)?;
        let file = match fs::File::open(self.get_file_path(key)).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(BlobError::not_found(key));
            }
            Err(e) => return Err(e.into()),
        };

        let stream = ReaderStream::with_capacity(file, READ_CHUNK_SIZE)
            .map(|chunk| chunk.map_err(BlobError::from));
        Ok(Box::pin(stream))
    }

    async fn delete(&self, key: &str) -> BlobResult<()> {
        validate_key(key)?;
        match fs::remove_file(self.get_file_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(BlobError::not_found(key)),
            Err(e) => Err(e.into()),
        }
    }

    async fn access_url(&self, key: &str, ttl: Duration) -> BlobResult<String> {
        validate_key(key)?;
        self.signer.sign(key, ttl).map_err(BlobError::transient)
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}
