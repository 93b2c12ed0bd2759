//! Response DTOs for Web API.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::catalog::{FileRecord, FolderRecord};
use crate::file::{FileListing, FilePage, FolderContents};

// ============================================================================
// Generic Response Wrappers
// ============================================================================

/// Generic API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a new API response.
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

// ============================================================================
// Folder DTOs
// ============================================================================

/// Folder in responses.
#[derive(Debug, Serialize)]
pub struct FolderResponse {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub child_file_ids: Vec<String>,
    pub child_folder_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<FolderRecord> for FolderResponse {
    fn from(folder: FolderRecord) -> Self {
        Self {
            id: folder.id,
            name: folder.name,
            parent_id: folder.parent_id,
            child_file_ids: folder.child_file_ids,
            child_folder_ids: folder.child_folder_ids,
            created_at: folder.created_at,
        }
    }
}

/// Direct contents of a folder.
#[derive(Debug, Serialize)]
pub struct FolderContentsResponse {
    pub folder: FolderResponse,
    pub files: Vec<FileResponse>,
    pub folders: Vec<FolderResponse>,
}

impl From<FolderContents> for FolderContentsResponse {
    fn from(contents: FolderContents) -> Self {
        Self {
            folder: contents.folder.into(),
            files: contents.files.into_iter().map(Into::into).collect(),
            folders: contents.folders.into_iter().map(Into::into).collect(),
        }
    }
}

// ============================================================================
// File DTOs
// ============================================================================

/// File metadata in responses. The blob key is never exposed.
#[derive(Debug, Serialize)]
pub struct FileResponse {
    pub id: String,
    pub name: String,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
}

impl From<FileRecord> for FileResponse {
    fn from(file: FileRecord) -> Self {
        Self {
            id: file.id,
            name: file.name,
            content_type: file.content_type,
            created_at: file.created_at,
        }
    }
}

/// File in a listing, with its access URL.
#[derive(Debug, Serialize)]
pub struct FileListingResponse {
    pub id: String,
    pub name: String,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
    /// Expiring URL for reading the content.
    pub url: String,
}

impl From<FileListing> for FileListingResponse {
    fn from(file: FileListing) -> Self {
        Self {
            id: file.id,
            name: file.name,
            content_type: file.content_type,
            created_at: file.created_at,
            url: file.url,
        }
    }
}

/// One page of a file listing or search.
#[derive(Debug, Serialize)]
pub struct FilePageResponse {
    pub current_page: u64,
    pub total_pages: u64,
    pub total_files: u64,
    pub files: Vec<FileListingResponse>,
}

impl From<FilePage> for FilePageResponse {
    fn from(page: FilePage) -> Self {
        Self {
            current_page: page.current_page,
            total_pages: page.total_pages,
            total_files: page.total_files,
            files: page.files.into_iter().map(Into::into).collect(),
        }
    }
}

// ============================================================================
// Misc
// ============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Active blob backend.
    pub storage: &'static str,
}
