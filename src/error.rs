//! Error types for arbor.

use std::fmt;

use thiserror::Error;

use crate::storage::BlobError;

/// Kind of catalog entity named in a not-found error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// A folder record.
    Folder,
    /// A file record.
    File,
    /// A blob in the object store.
    Blob,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Folder => "folder",
            EntityKind::File => "file",
            EntityKind::Blob => "blob",
        })
    }
}

/// Blob store operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobOperation {
    Put,
    Get,
    Delete,
    Sign,
}

impl fmt::Display for BlobOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BlobOperation::Put => "put",
            BlobOperation::Get => "get",
            BlobOperation::Delete => "delete",
            BlobOperation::Sign => "sign",
        })
    }
}

/// Common error type for arbor.
#[derive(Error, Debug)]
pub enum ArborError {
    /// Database error.
    ///
    /// Errors from sqlx are converted into this variant.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation error for caller input.
    #[error("validation error: {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Entity not found.
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// The parent folder named at creation does not exist.
    #[error("parent folder not found: {0}")]
    ParentNotFound(String),

    /// A blob store call failed.
    #[error("blob store {operation} failed for key {key}: {source}")]
    BlobStore {
        operation: BlobOperation,
        key: String,
        #[source]
        source: BlobError,
    },

    /// A cascading folder deletion stopped part way through.
    ///
    /// Everything counted here is already gone; nothing was rolled back.
    #[error(
        "deletion of folder {folder_id} aborted after removing {files_deleted} files and \
         {folders_deleted} folders: {source}"
    )]
    PartialCascade {
        folder_id: String,
        files_deleted: usize,
        folders_deleted: usize,
        #[source]
        source: Box<ArborError>,
    },

    /// Archive encoding error.
    #[error("archive error: {0}")]
    Archive(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ArborError {
    /// Create a validation error.
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ArborError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a folder not-found error.
    pub fn folder_not_found(id: impl Into<String>) -> Self {
        ArborError::NotFound {
            kind: EntityKind::Folder,
            id: id.into(),
        }
    }

    /// Create a file not-found error.
    pub fn file_not_found(id: impl Into<String>) -> Self {
        ArborError::NotFound {
            kind: EntityKind::File,
            id: id.into(),
        }
    }

    /// Wrap a blob store error with the operation and key it came from.
    pub fn blob(operation: BlobOperation, key: impl Into<String>, source: BlobError) -> Self {
        ArborError::BlobStore {
            operation,
            key: key.into(),
            source,
        }
    }

    /// Whether this error means the requested entity does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ArborError::NotFound { .. })
    }
}

// Conversion from sqlx errors
impl From<sqlx::Error> for ArborError {
    fn from(e: sqlx::Error) -> Self {
        ArborError::Database(e.to_string())
    }
}

impl From<async_zip::error::ZipError> for ArborError {
    fn from(e: async_zip::error::ZipError) -> Self {
        ArborError::Archive(e.to_string())
    }
}

impl From<url::ParseError> for ArborError {
    fn from(e: url::ParseError) -> Self {
        ArborError::Config(format!("invalid URL: {e}"))
    }
}

/// Result type alias for arbor operations.
pub type Result<T> = std::result::Result<T, ArborError>;
