//! Folder and file management for arbor.
//!
//! This module provides the operations on top of the catalog and blob store:
//! - Folder tree creation, listing and cascading deletion
//! - Streaming ZIP export of a folder subtree
//! - Paginated file listing and search with expiring access URLs
//! - Single-file upload, download and deletion

mod archive;
mod query;
mod service;
mod tree;

pub use archive::{ArchiveExporter, ArchivePlan, ExportSummary};
pub use query::{CatalogQueryService, FileListing, FilePage, DEFAULT_LIMIT, DEFAULT_PAGE};
pub use service::{FileService, OpenedFile};
pub use tree::{DeleteReport, FolderContents, FolderTreeManager};

use crate::{ArborError, Result};

/// Maximum length for file and folder names (in characters).
pub const MAX_NAME_LENGTH: usize = 255;

/// Content type recorded when the uploader gives none.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

fn validate_name(field: &str, name: &str) -> Result<String> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ArborError::validation(field, "must not be empty"));
    }

    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(ArborError::validation(
            field,
            format!("must be at most {MAX_NAME_LENGTH} characters"),
        ));
    }

    if name.chars().any(char::is_control) {
        return Err(ArborError::validation(
            field,
            "must not contain control characters",
        ));
    }

    Ok(name.to_string())
}

/// Validate a file name, returning it trimmed.
pub fn validate_file_name(name: &str) -> Result<String> {
    validate_name("name", name)
}

/// Validate a folder name, returning it trimmed.
///
/// Folder names become archive path segments, so separators and dot segments are rejected.
pub fn validate_folder_name(name: &str) -> Result<String> {
    let name = validate_name("name", name)?;

    if name.contains('/') || name.contains('\\') {
        return Err(ArborError::validation("name", "must not contain '/' or '\\'"));
    }

    if name == "." || name == ".." {
        return Err(ArborError::validation("name", "must not be '.' or '..'"));
    }

    Ok(name)
}

/// Use the given content type, or the default when it is blank.
pub fn normalize_content_type(content_type: Option<&str>) -> String {
    match content_type.map(str::trim) {
        Some(ct) if !ct.is_empty() => ct.to_string(),
        _ => DEFAULT_CONTENT_TYPE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_file_name() {
        assert_eq!(validate_file_name("  report.pdf ").unwrap(), "report.pdf");
        assert_eq!(validate_file_name("a/b.txt").unwrap(), "a/b.txt");
        assert!(validate_file_name("").is_err());
        assert!(validate_file_name("   ").is_err());
        assert!(validate_file_name("bad\nname").is_err());
        assert!(validate_file_name(&"x".repeat(MAX_NAME_LENGTH)).is_ok());
        assert!(validate_file_name(&"x".repeat(MAX_NAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_validate_file_name_counts_chars() {
        // Multi-byte names are measured in characters, not bytes.
        let name = "あ".repeat(MAX_NAME_LENGTH);
        assert!(validate_file_name(&name).is_ok());
    }

    #[test]
    fn test_validate_folder_name() {
        assert_eq!(validate_folder_name(" 2024 ").unwrap(), "2024");
        assert!(validate_folder_name("a/b").is_err());
        assert!(validate_folder_name("a\\b").is_err());
        assert!(validate_folder_name(".").is_err());
        assert!(validate_folder_name("..").is_err());
        assert!(validate_folder_name("...").is_ok());
        assert!(validate_folder_name("").is_err());
    }

    #[test]
    fn test_validation_error_names_field() {
        match validate_folder_name("") {
            Err(ArborError::Validation { field, .. }) => assert_eq!(field, "name"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_normalize_content_type() {
        assert_eq!(normalize_content_type(Some("text/plain")), "text/plain");
        assert_eq!(normalize_content_type(Some("  ")), DEFAULT_CONTENT_TYPE);
        assert_eq!(normalize_content_type(None), DEFAULT_CONTENT_TYPE);
    }
}
