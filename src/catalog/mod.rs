//! Metadata catalog for arbor.
//!
//! The catalog persists [`FolderRecord`] and [`FileRecord`] entities. Child sets are
//! maintained through element-level add/remove operations, so concurrent writers targeting the
//! same parent never overwrite each other's changes.

mod record;
mod sqlite;

pub use record::{FileRecord, FileSlice, FolderRecord};
pub use sqlite::SqliteCatalog;

use async_trait::async_trait;

use crate::Result;

/// Persistent store for folder and file metadata.
///
/// Every write is durable before the call returns.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Insert a folder.
    ///
    /// When the record has a parent, the folder is added to the parent's child set in the same
    /// write. Fails with `ParentNotFound` if the parent does not exist at that moment.
    /// Child sets on the passed record are ignored.
    async fn insert_folder(&self, folder: &FolderRecord) -> Result<()>;

    /// Get a folder with its child sets.
    async fn get_folder(&self, id: &str) -> Result<Option<FolderRecord>>;

    /// Get the folders with the given IDs, in the given order. Missing IDs are skipped.
    async fn get_folders(&self, ids: &[String]) -> Result<Vec<FolderRecord>>;

    /// List folders without a parent, oldest first.
    async fn list_root_folders(&self) -> Result<Vec<FolderRecord>>;

    /// Count all folders.
    async fn count_folders(&self) -> Result<u64>;

    /// Delete a folder record and remove it from its parent's child set.
    ///
    /// The folder must have no remaining children. Returns false if it did not exist.
    async fn delete_folder(&self, id: &str) -> Result<bool>;

    /// Insert a file, adding it to `folder_id`'s child set in the same write when given.
    ///
    /// Fails with `NotFound` if the folder does not exist at that moment.
    async fn insert_file(&self, file: &FileRecord, folder_id: Option<&str>) -> Result<()>;

    /// Get a file by ID.
    async fn get_file(&self, id: &str) -> Result<Option<FileRecord>>;

    /// Get the files with the given IDs, in the given order. Missing IDs are skipped.
    async fn get_files(&self, ids: &[String]) -> Result<Vec<FileRecord>>;

    /// Delete a file record and remove it from any folder's child set.
    ///
    /// Returns false if it did not exist.
    async fn delete_file(&self, id: &str) -> Result<bool>;

    /// List a window of files in creation order, with the total count.
    ///
    /// The window and the count come from one read, so they always agree.
    async fn list_files(&self, skip: u64, limit: u64) -> Result<FileSlice>;

    /// Count all files.
    async fn count_files(&self) -> Result<u64>;

    /// List a window of files whose name contains `query`, ignoring case, in creation order,
    /// with the number of matches.
    async fn search_files(&self, query: &str, skip: u64, limit: u64) -> Result<FileSlice>;
}
