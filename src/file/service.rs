//! File service for arbor.
//!
//! This module provides single-file operations that do not involve the folder tree:
//! - Upload of an unattached file
//! - Download as a byte stream
//! - Deletion of the blob and its record

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, FileRecord};
use crate::error::{BlobOperation, EntityKind};
use crate::storage::{generate_blob_key, BlobStore, BlobStream};
use crate::{ArborError, Result};

use super::{normalize_content_type, validate_file_name};

/// An opened file: its record plus a stream over its content.
pub struct OpenedFile {
    /// File metadata.
    pub record: FileRecord,
    /// File content.
    pub content: BlobStream,
}

impl std::fmt::Debug for OpenedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenedFile")
            .field("record", &self.record)
            .finish_non_exhaustive()
    }
}

/// Upload content under a fresh blob key and record it, attached to `folder_id` when given.
///
/// Nothing is recorded if the upload fails. If the record cannot be written after a
/// successful upload, the blob is deleted again; when that also fails it is logged as an
/// orphan.
pub(crate) async fn store_new_file(
    catalog: &dyn Catalog,
    blobs: &dyn BlobStore,
    folder_id: Option<&str>,
    content: Bytes,
    original_name: &str,
    content_type: Option<&str>,
) -> Result<FileRecord> {
    let name = validate_file_name(original_name)?;
    let content_type = normalize_content_type(content_type);
    let key = generate_blob_key();
    let size = content.len();

    blobs
        .put(&key, content, &content_type)
        .await
        .map_err(|e| ArborError::blob(BlobOperation::Put, &key, e))?;

    let record = FileRecord::new(name, key, content_type);
    if let Err(e) = catalog.insert_file(&record, folder_id).await {
        discard_unrecorded_blob(blobs, &record.blob_key).await;
        return Err(e);
    }

    info!(
        "Stored file {} ({}, {} bytes) as blob {}",
        record.id, record.name, size, record.blob_key
    );
    Ok(record)
}

async fn discard_unrecorded_blob(blobs: &dyn BlobStore, key: &str) {
    match blobs.delete(key).await {
        Ok(()) => debug!("Removed blob {} after failed metadata write", key),
        Err(e) => warn!(
            "Orphaned blob {} left in {} store after failed metadata write: {}",
            key,
            blobs.backend_name(),
            e
        ),
    }
}

/// Delete a blob, treating an already-missing blob as deleted.
pub(crate) async fn remove_blob(blobs: &dyn BlobStore, key: &str) -> Result<()> {
    match blobs.delete(key).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_not_found() => {
            warn!("Blob {} was already missing from the store", key);
            Ok(())
        }
        Err(e) => Err(ArborError::blob(BlobOperation::Delete, key, e)),
    }
}

/// Service for files addressed individually by ID.
#[derive(Clone)]
pub struct FileService {
    catalog: Arc<dyn Catalog>,
    blobs: Arc<dyn BlobStore>,
}

impl FileService {
    /// Create a new FileService.
    pub fn new(catalog: Arc<dyn Catalog>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { catalog, blobs }
    }

    /// Upload a file that belongs to no folder.
    pub async fn upload(
        &self,
        content: Bytes,
        original_name: &str,
        content_type: Option<&str>,
    ) -> Result<FileRecord> {
        store_new_file(
            self.catalog.as_ref(),
            self.blobs.as_ref(),
            None,
            content,
            original_name,
            content_type,
        )
        .await
    }

    /// Get a file's record.
    pub async fn get(&self, file_id: &str) -> Result<FileRecord> {
        self.catalog
            .get_file(file_id)
            .await?
            .ok_or_else(|| ArborError::file_not_found(file_id))
    }

    /// Open a file for download.
    pub async fn open(&self, file_id: &str) -> Result<OpenedFile> {
        let record = self.get(file_id).await?;

        let content = self.blobs.get(&record.blob_key).await.map_err(|e| {
            if e.is_not_found() {
                ArborError::NotFound {
                    kind: EntityKind::Blob,
                    id: record.blob_key.clone(),
                }
            } else {
                ArborError::blob(BlobOperation::Get, &record.blob_key, e)
            }
        })?;

        Ok(OpenedFile { record, content })
    }

    /// Delete a file's blob and then its record.
    ///
    /// The record is also removed from any folder that lists it.
    pub async fn delete(&self, file_id: &str) -> Result<()> {
        let record = self.get(file_id).await?;

        remove_blob(self.blobs.as_ref(), &record.blob_key).await?;

        if !self.catalog.delete_file(&record.id).await? {
            return Err(ArborError::file_not_found(file_id));
        }

        info!("Deleted file {} ({})", record.id, record.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use futures::TryStreamExt;

    use super::*;
    use crate::catalog::{FolderRecord, SqliteCatalog};
    use crate::db::Database;
    use crate::storage::MemoryBlobStore;

    async fn setup() -> (FileService, Arc<SqliteCatalog>, Arc<MemoryBlobStore>) {
        let db = Database::open_in_memory().await.unwrap();
        let catalog = Arc::new(SqliteCatalog::new(&db));
        let blobs = Arc::new(MemoryBlobStore::new());
        let service = FileService::new(catalog.clone(), blobs.clone());
        (service, catalog, blobs)
    }

    async fn read_all(stream: BlobStream) -> Vec<u8> {
        let chunks: Vec<Bytes> = stream.try_collect().await.unwrap();
        chunks.concat()
    }

    #[tokio::test]
    async fn test_upload_stores_blob_and_record() {
        let (service, catalog, blobs) = setup().await;

        let file = service
            .upload(Bytes::from_static(b"hello"), " notes.txt ", Some("text/plain"))
            .await
            .unwrap();

        assert_eq!(file.name, "notes.txt");
        assert_eq!(file.content_type, "text/plain");
        assert!(blobs.contains(&file.blob_key));
        assert_eq!(blobs.content_type(&file.blob_key).as_deref(), Some("text/plain"));
        assert_eq!(catalog.count_files().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upload_default_content_type() {
        let (service, _, _) = setup().await;
        let file = service
            .upload(Bytes::from_static(b"x"), "blob.bin", None)
            .await
            .unwrap();
        assert_eq!(file.content_type, "application/octet-stream");
    }

    #[tokio::test]
    async fn test_upload_invalid_name_has_no_side_effects() {
        let (service, catalog, blobs) = setup().await;

        let result = service.upload(Bytes::from_static(b"x"), "  ", None).await;
        assert!(matches!(result, Err(ArborError::Validation { .. })));
        assert!(blobs.is_empty());
        assert_eq!(catalog.count_files().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_upload_failure_creates_no_record() {
        let (service, catalog, blobs) = setup().await;
        blobs.fail_puts(true);

        let result = service
            .upload(Bytes::from_static(b"x"), "a.txt", None)
            .await;
        assert!(matches!(
            result,
            Err(ArborError::BlobStore {
                operation: BlobOperation::Put,
                ..
            })
        ));
        assert_eq!(catalog.count_files().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_record_write_discards_blob() {
        let (_, catalog, blobs) = setup().await;

        let result = store_new_file(
            catalog.as_ref(),
            blobs.as_ref(),
            Some("no-such-folder"),
            Bytes::from_static(b"x"),
            "a.txt",
            None,
        )
        .await;

        assert!(matches!(result, Err(ArborError::NotFound { .. })));
        assert!(blobs.is_empty());
        assert_eq!(catalog.count_files().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_open_streams_content() {
        let (service, _, _) = setup().await;
        let content = vec![7u8; 20_000];
        let file = service
            .upload(Bytes::from(content.clone()), "big.bin", None)
            .await
            .unwrap();

        let opened = service.open(&file.id).await.unwrap();
        assert_eq!(opened.record.id, file.id);
        assert_eq!(read_all(opened.content).await, content);
    }

    #[tokio::test]
    async fn test_open_missing() {
        let (service, _, blobs) = setup().await;
        assert!(matches!(
            service.open("missing").await,
            Err(ArborError::NotFound {
                kind: EntityKind::File,
                ..
            })
        ));

        let file = service
            .upload(Bytes::from_static(b"x"), "a.txt", None)
            .await
            .unwrap();
        blobs.delete(&file.blob_key).await.unwrap();
        assert!(matches!(
            service.open(&file.id).await,
            Err(ArborError::NotFound {
                kind: EntityKind::Blob,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_delete_removes_blob_and_record() {
        let (service, catalog, blobs) = setup().await;
        let folder = FolderRecord::new("Folder", None);
        catalog.insert_folder(&folder).await.unwrap();
        let file = store_new_file(
            catalog.as_ref(),
            blobs.as_ref(),
            Some(&folder.id),
            Bytes::from_static(b"x"),
            "a.txt",
            None,
        )
        .await
        .unwrap();

        service.delete(&file.id).await.unwrap();

        assert!(!blobs.contains(&file.blob_key));
        assert!(catalog.get_file(&file.id).await.unwrap().is_none());
        let folder = catalog.get_folder(&folder.id).await.unwrap().unwrap();
        assert!(folder.child_file_ids.is_empty());

        assert!(matches!(
            service.delete(&file.id).await,
            Err(ArborError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_tolerates_missing_blob() {
        let (service, catalog, blobs) = setup().await;
        let file = service
            .upload(Bytes::from_static(b"x"), "a.txt", None)
            .await
            .unwrap();
        blobs.delete(&file.blob_key).await.unwrap();

        service.delete(&file.id).await.unwrap();
        assert!(catalog.get_file(&file.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_blob_failure_keeps_record() {
        let (service, catalog, blobs) = setup().await;
        let file = service
            .upload(Bytes::from_static(b"x"), "a.txt", None)
            .await
            .unwrap();
        blobs.fail_delete(&file.blob_key);

        assert!(matches!(
            service.delete(&file.id).await,
            Err(ArborError::BlobStore {
                operation: BlobOperation::Delete,
                ..
            })
        ));
        assert!(catalog.get_file(&file.id).await.unwrap().is_some());
    }
}
