//! API handlers for the arbor HTTP layer.

pub mod blob;
pub mod file;
pub mod folder;

pub use blob::*;
pub use file::*;
pub use folder::*;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::Multipart;
use axum::http::StatusCode;
use bytes::Bytes;

use crate::catalog::Catalog;
use crate::config::{Config, StorageBackend};
use crate::file::{ArchiveExporter, CatalogQueryService, FileService, FolderTreeManager};
use crate::storage::{BlobStore, UrlSigner};
use crate::web::error::ApiError;
use crate::Result;

/// Default request body limit for uploads (50MB).
pub const DEFAULT_MAX_UPLOAD_SIZE: usize = 50 * 1024 * 1024;

/// Default size of the pipe between the archive writer and the response body.
pub const DEFAULT_PIPE_BUFFER: usize = 64 * 1024;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Folder tree operations.
    pub tree: FolderTreeManager,
    /// Single-file operations.
    pub files: FileService,
    /// Listing and search.
    pub query: CatalogQueryService,
    /// Archive export.
    pub archive: ArchiveExporter,
    /// Blob store, for serving signed blob URLs.
    pub blobs: Arc<dyn BlobStore>,
    /// Verifier for `/blobs` URLs; None when the backend signs its own URLs.
    pub signer: Option<UrlSigner>,
    /// Maximum upload size in bytes.
    pub max_upload_size: usize,
    /// Archive pipe size in bytes.
    pub pipe_buffer: usize,
}

impl AppState {
    /// Create application state with default tuning.
    pub fn new(catalog: Arc<dyn Catalog>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            tree: FolderTreeManager::new(catalog.clone(), blobs.clone()),
            files: FileService::new(catalog.clone(), blobs.clone()),
            query: CatalogQueryService::new(catalog.clone(), blobs.clone()),
            archive: ArchiveExporter::new(catalog, blobs.clone()),
            blobs,
            signer: None,
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            pipe_buffer: DEFAULT_PIPE_BUFFER,
        }
    }

    /// Create application state tuned by the configuration.
    pub fn from_config(
        catalog: Arc<dyn Catalog>,
        blobs: Arc<dyn BlobStore>,
        config: &Config,
    ) -> Result<Self> {
        let mut state = Self::new(catalog, blobs);

        state.query = state
            .query
            .with_url_ttl(Duration::from_secs(config.catalog.access_url_ttl_secs))
            .with_url_fanout(config.catalog.url_fanout);
        state.archive = state
            .archive
            .with_prefetch(config.archive.prefetch)
            .with_compression(config.archive.compression);
        state.max_upload_size = config.server.max_upload_bytes();
        state.pipe_buffer = config.archive.pipe_buffer_kb.max(1) * 1024;

        if config.storage.backend == StorageBackend::Local {
            state.signer = Some(UrlSigner::new(
                &config.storage.signing_secret,
                &config.storage.public_base_url,
            )?);
        }

        Ok(state)
    }

    /// Set the verifier for `/blobs` URLs.
    pub fn with_signer(mut self, signer: UrlSigner) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Set the maximum upload size in bytes.
    pub fn with_max_upload_size(mut self, bytes: usize) -> Self {
        self.max_upload_size = bytes;
        self
    }
}

/// A file received in a multipart upload.
#[derive(Debug)]
pub struct UploadedFile {
    /// Original file name.
    pub name: String,
    /// Content type sent by the client, or guessed from the name.
    pub content_type: String,
    /// File content.
    pub content: Bytes,
}

/// Read the `file` field of a multipart upload.
pub async fn read_upload(mut multipart: Multipart) -> std::result::Result<UploadedFile, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }

        let name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::bad_request("file name missing").with_field("file"))?;
        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| mime_guess::from_path(&name).first_or_octet_stream().to_string());
        let content = field.bytes().await.map_err(multipart_error)?;

        return Ok(UploadedFile {
            name,
            content_type,
            content,
        });
    }

    Err(ApiError::bad_request("No file provided").with_field("file"))
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large("File too large")
    } else {
        tracing::warn!("Failed to read multipart data: {}", e);
        ApiError::bad_request("Invalid multipart data")
    }
}

/// Generate a safe Content-Disposition header value for downloads.
///
/// Control characters are dropped and quotes escaped in the plain `filename`; non-ASCII names
/// also get an RFC 5987 `filename*` parameter.
pub fn content_disposition_header(filename: &str) -> String {
    let sanitized: String = filename
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '"' | '\\' => '_',
            _ => c,
        })
        .collect();

    if filename.is_ascii() && sanitized == filename {
        return format!("attachment; filename=\"{}\"", filename);
    }

    let encoded = urlencoding::encode(filename);
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        sanitized, encoded
    )
}
