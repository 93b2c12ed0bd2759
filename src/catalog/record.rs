//! Catalog record types.

use chrono::{DateTime, Utc};

/// Metadata for one stored file.
///
/// Records are immutable once inserted; the only change is deletion.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct FileRecord {
    /// Unique file ID.
    pub id: String,
    /// Display name (the original upload name).
    pub name: String,
    /// Key of the blob holding the content.
    pub blob_key: String,
    /// MIME type recorded at upload.
    pub content_type: String,
    /// When the file was created.
    pub created_at: DateTime<Utc>,
}

impl FileRecord {
    /// Create a record with a fresh ID and the current time.
    pub fn new(
        name: impl Into<String>,
        blob_key: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            blob_key: blob_key.into(),
            content_type: content_type.into(),
            created_at: Utc::now(),
        }
    }
}

/// A window of a file listing, read together with the size of the whole listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSlice {
    /// Number of files in the whole listing.
    pub total: u64,
    /// Files inside the window, in creation order.
    pub files: Vec<FileRecord>,
}

/// A folder and the IDs of its direct children.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct FolderRecord {
    /// Unique folder ID.
    pub id: String,
    /// Folder name.
    pub name: String,
    /// Parent folder ID (None for root folders). Fixed at creation.
    pub parent_id: Option<String>,
    /// Direct child files, in attachment order.
    #[sqlx(skip)]
    pub child_file_ids: Vec<String>,
    /// Direct child folders, in attachment order.
    #[sqlx(skip)]
    pub child_folder_ids: Vec<String>,
    /// When the folder was created.
    pub created_at: DateTime<Utc>,
}

impl FolderRecord {
    /// Create an empty folder record with a fresh ID and the current time.
    pub fn new(name: impl Into<String>, parent_id: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            parent_id,
            child_file_ids: Vec::new(),
            child_folder_ids: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Check if this is a root folder.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_file_record() {
        let file = FileRecord::new("report.pdf", "abc123", "application/pdf");
        assert_eq!(file.name, "report.pdf");
        assert_eq!(file.blob_key, "abc123");
        assert!(uuid::Uuid::parse_str(&file.id).is_ok());
    }

    #[test]
    fn test_new_folder_record() {
        let root = FolderRecord::new("Docs", None);
        assert!(root.is_root());
        assert!(root.child_file_ids.is_empty());
        assert!(root.child_folder_ids.is_empty());

        let child = FolderRecord::new("2024", Some(root.id.clone()));
        assert!(!child.is_root());
        assert_ne!(child.id, root.id);
    }
}
