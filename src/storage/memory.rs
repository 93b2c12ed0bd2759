//! In-process blob storage.
//!
//! Used for development and tests. Failures can be injected per key to exercise partial-failure
//! paths in the callers.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;

use super::{BlobError, BlobResult, BlobStore, BlobStream};

/// Chunk size used when streaming stored content back out.
const CHUNK_SIZE: usize = 8 * 1024;

#[derive(Debug, Clone)]
struct StoredBlob {
    content: Bytes,
    content_type: String,
}

#[derive(Debug, Default)]
struct Faults {
    fail_puts: bool,
    get: HashSet<String>,
    get_midstream: HashSet<String>,
    delete: HashSet<String>,
}

/// Blob store that keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, StoredBlob>>,
    faults: Mutex<Faults>,
    gets: AtomicUsize,
    deletes: AtomicUsize,
    closed: AtomicBool,
}

impl MemoryBlobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.lock_blobs().len()
    }

    /// Whether the store holds no blobs.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a blob exists under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.lock_blobs().contains_key(key)
    }

    /// Keys of all stored blobs, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        self.lock_blobs().keys().cloned().collect()
    }

    /// Content type recorded for `key`.
    pub fn content_type(&self, key: &str) -> Option<String> {
        self.lock_blobs().get(key).map(|b| b.content_type.clone())
    }

    /// Number of `get` calls served so far, including failed ones.
    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Number of successful deletions so far.
    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Make every subsequent `put` fail.
    pub fn fail_puts(&self, fail: bool) {
        self.lock_faults().fail_puts = fail;
    }

    /// Make `get` fail for `key` before any data is returned.
    pub fn fail_get(&self, key: &str) {
        self.lock_faults().get.insert(key.to_string());
    }

    /// Make `get` for `key` return its first chunk and then fail.
    pub fn fail_get_midstream(&self, key: &str) {
        self.lock_faults().get_midstream.insert(key.to_string());
    }

    /// Make `delete` fail for `key`.
    pub fn fail_delete(&self, key: &str) {
        self.lock_faults().delete.insert(key.to_string());
    }

    /// Make every operation fail as if the backend were unreachable.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn lock_blobs(&self) -> std::sync::MutexGuard<'_, HashMap<String, StoredBlob>> {
        self.blobs.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_faults(&self) -> std::sync::MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_open(&self) -> BlobResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(BlobError::transient("memory store closed"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, content: Bytes, content_type: &str) -> BlobResult<()> {
        self.check_open()?;
        if self.lock_faults().fail_puts {
            return Err(BlobError::transient(format!("injected put failure for {key}")));
        }

        self.lock_blobs().insert(
            key.to_string(),
            StoredBlob {
                content,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> BlobResult<BlobStream> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.check_open()?;

        let (fail_now, fail_later) = {
            let faults = self.lock_faults();
            (faults.get.contains(key), faults.get_midstream.contains(key))
        };
        if fail_now {
            return Err(BlobError::transient(format!("injected get failure for {key}")));
        }

        let content = self
            .lock_blobs()
            .get(key)
            .map(|b| b.content.clone())
            .ok_or_else(|| BlobError::not_found(key))?;

        let mut chunks: Vec<BlobResult<Bytes>> = content
            .chunks(CHUNK_SIZE)
            .map(|c| Ok(content.slice_ref(c)))
            .collect();
        if fail_later {
            chunks.truncate(1);
            chunks.push(Err(BlobError::transient(format!(
                "injected read failure for {key}"
            ))));
        }

        Ok(Box::pin(futures::stream::iter(chunks)))
    }

    async fn delete(&self, key: &str) -> BlobResult<()> {
        self.check_open()?;
        if self.lock_faults().delete.contains(key) {
            return Err(BlobError::transient(format!("injected delete failure for {key}")));
        }

        match self.lock_blobs().remove(key) {
            Some(_) => {
                self.deletes.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            None => Err(BlobError::not_found(key)),
        }
    }

    async fn access_url(&self, key: &str, ttl: Duration) -> BlobResult<String> {
        self.check_open()?;
        let expires = Utc::now().timestamp() + ttl.as_secs() as i64;
        Ok(format!("memory://{key}?expires={expires}"))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
