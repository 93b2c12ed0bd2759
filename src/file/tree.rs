//! Folder tree management.
//!
//! Folders form a forest: each folder names its parent at creation and never moves. The parent
//! keeps the IDs of its direct files and subfolders, and both ends are written together.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, error, info};

use crate::catalog::{Catalog, FileRecord, FolderRecord};
use crate::storage::BlobStore;
use crate::{ArborError, Result};

use super::service::{remove_blob, store_new_file};
use super::validate_folder_name;

/// Direct contents of one folder.
#[derive(Debug, Clone)]
pub struct FolderContents {
    /// The folder itself.
    pub folder: FolderRecord,
    /// Direct files, in attachment order.
    pub files: Vec<FileRecord>,
    /// Direct subfolders, in attachment order.
    pub folders: Vec<FolderRecord>,
}

/// What a cascading deletion removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteReport {
    /// Files whose blob and record were removed.
    pub files_deleted: usize,
    /// Folder records removed, including the starting folder.
    pub folders_deleted: usize,
}

enum Visit {
    /// Delete the folder's files and queue its subfolders.
    Enter(String),
    /// All subfolders are gone; delete the folder record.
    Exit(String),
}

/// Manager for folder creation, listing and cascading deletion.
#[derive(Clone)]
pub struct FolderTreeManager {
    catalog: Arc<dyn Catalog>,
    blobs: Arc<dyn BlobStore>,
}

impl FolderTreeManager {
    /// Create a new FolderTreeManager.
    pub fn new(catalog: Arc<dyn Catalog>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { catalog, blobs }
    }

    /// Create a folder, under `parent_id` when given or as a root otherwise.
    pub async fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<FolderRecord> {
        let name = validate_folder_name(name)?;

        if let Some(parent_id) = parent_id {
            if self.catalog.get_folder(parent_id).await?.is_none() {
                return Err(ArborError::ParentNotFound(parent_id.to_string()));
            }
        }

        let folder = FolderRecord::new(name, parent_id.map(str::to_string));
        self.catalog.insert_folder(&folder).await?;

        info!(
            "Created folder {} ({}) under {}",
            folder.id,
            folder.name,
            parent_id.unwrap_or("root")
        );
        Ok(folder)
    }

    /// Upload content and record it as a file in `folder_id`.
    pub async fn create_file(
        &self,
        folder_id: &str,
        content: Bytes,
        original_name: &str,
        content_type: Option<&str>,
    ) -> Result<FileRecord> {
        if self.catalog.get_folder(folder_id).await?.is_none() {
            return Err(ArborError::folder_not_found(folder_id));
        }

        store_new_file(
            self.catalog.as_ref(),
            self.blobs.as_ref(),
            Some(folder_id),
            content,
            original_name,
            content_type,
        )
        .await
    }

    /// List all folders without a parent.
    pub async fn list_root_folders(&self) -> Result<Vec<FolderRecord>> {
        self.catalog.list_root_folders().await
    }

    /// Get a folder's direct files and subfolders.
    pub async fn list_folder_contents(&self, folder_id: &str) -> Result<FolderContents> {
        let folder = self
            .catalog
            .get_folder(folder_id)
            .await?
            .ok_or_else(|| ArborError::folder_not_found(folder_id))?;

        let files = self.catalog.get_files(&folder.child_file_ids).await?;
        let folders = self.catalog.get_folders(&folder.child_folder_ids).await?;

        Ok(FolderContents {
            folder,
            files,
            folders,
        })
    }

    /// Delete a folder and everything below it.
    ///
    /// Folders are visited depth first. Each folder's files are removed (blob, then record)
    /// before its subfolders, and its own record goes last, which also detaches it from its
    /// parent. The first failure stops the walk; the error reports how much was already
    /// removed and nothing is restored.
    pub async fn delete_folder(&self, folder_id: &str) -> Result<DeleteReport> {
        if self.catalog.get_folder(folder_id).await?.is_none() {
            return Err(ArborError::folder_not_found(folder_id));
        }

        let mut report = DeleteReport::default();
        match self.delete_subtree(folder_id, &mut report).await {
            Ok(()) => {
                info!(
                    "Deleted folder {}: {} files, {} folders",
                    folder_id, report.files_deleted, report.folders_deleted
                );
                Ok(report)
            }
            Err(e) => {
                error!(
                    "Deletion of folder {} aborted after {} files and {} folders: {}",
                    folder_id, report.files_deleted, report.folders_deleted, e
                );
                Err(ArborError::PartialCascade {
                    folder_id: folder_id.to_string(),
                    files_deleted: report.files_deleted,
                    folders_deleted: report.folders_deleted,
                    source: Box::new(e),
                })
            }
        }
    }

    async fn delete_subtree(&self, root_id: &str, report: &mut DeleteReport) -> Result<()> {
        let mut stack = vec![Visit::Enter(root_id.to_string())];

        while let Some(visit) = stack.pop() {
            match visit {
                Visit::Enter(id) => {
                    // A subfolder can vanish under a concurrent delete; its subtree is gone too.
                    let Some(folder) = self.catalog.get_folder(&id).await? else {
                        debug!("Folder {} already deleted", id);
                        continue;
                    };

                    for file_id in &folder.child_file_ids {
                        if self.delete_file(file_id).await? {
                            report.files_deleted += 1;
                        }
                    }

                    stack.push(Visit::Exit(id));
                    for child_id in folder.child_folder_ids.into_iter().rev() {
                        stack.push(Visit::Enter(child_id));
                    }
                }
                Visit::Exit(id) => {
                    if self.catalog.delete_folder(&id).await? {
                        debug!("Deleted folder record {}", id);
                        report.folders_deleted += 1;
                    }
                }
            }
        }

        Ok(())
    }

    async fn delete_file(&self, file_id: &str) -> Result<bool> {
        let Some(file) = self.catalog.get_file(file_id).await? else {
            debug!("File {} already deleted", file_id);
            return Ok(false);
        };

        remove_blob(self.blobs.as_ref(), &file.blob_key).await?;
        let deleted = self.catalog.delete_file(&file.id).await?;
        debug!("Deleted file {} ({})", file.id, file.name);
        Ok(deleted)
    }
}
