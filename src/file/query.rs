//! Paginated file listing and search.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::{stream, StreamExt, TryStreamExt};
use tracing::debug;

use crate::catalog::{Catalog, FileRecord, FileSlice};
use crate::error::BlobOperation;
use crate::storage::BlobStore;
use crate::{ArborError, Result};

/// Page returned when none (or a non-positive one) is requested.
pub const DEFAULT_PAGE: u64 = 1;

/// Page size used when none (or a non-positive one) is requested.
pub const DEFAULT_LIMIT: u64 = 10;

/// Default lifetime of issued access URLs.
pub const DEFAULT_ACCESS_URL_TTL: Duration = Duration::from_secs(3600);

/// Default number of access URLs generated concurrently.
pub const DEFAULT_URL_FANOUT: usize = 8;

/// A file in a listing, with an access URL in place of its blob key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileListing {
    /// File ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// MIME type recorded at upload.
    pub content_type: String,
    /// When the file was created.
    pub created_at: DateTime<Utc>,
    /// Expiring URL granting read access to the content.
    pub url: String,
}

impl FileListing {
    fn new(file: FileRecord, url: String) -> Self {
        Self {
            id: file.id,
            name: file.name,
            content_type: file.content_type,
            created_at: file.created_at,
            url,
        }
    }
}

/// One page of files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePage {
    /// 1-based page number.
    pub current_page: u64,
    /// Number of pages at this page size; 0 when nothing matches.
    pub total_pages: u64,
    /// Number of matching files.
    pub total_files: u64,
    /// Files on this page, in creation order.
    pub files: Vec<FileListing>,
}

/// Resolve requested paging, falling back to defaults for missing or non-positive values.
pub fn normalize_paging(page: Option<i64>, limit: Option<i64>) -> (u64, u64) {
    let page = page.filter(|p| *p > 0).map_or(DEFAULT_PAGE, |p| p as u64);
    let limit = limit.filter(|l| *l > 0).map_or(DEFAULT_LIMIT, |l| l as u64);
    (page, limit)
}

/// Service for listing and searching files across the catalog.
#[derive(Clone)]
pub struct CatalogQueryService {
    catalog: Arc<dyn Catalog>,
    blobs: Arc<dyn BlobStore>,
    url_ttl: Duration,
    url_fanout: usize,
}

impl CatalogQueryService {
    /// Create a new CatalogQueryService with the default URL lifetime and fan-out.
    pub fn new(catalog: Arc<dyn Catalog>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            catalog,
            blobs,
            url_ttl: DEFAULT_ACCESS_URL_TTL,
            url_fanout: DEFAULT_URL_FANOUT,
        }
    }

    /// Set the lifetime of issued access URLs.
    pub fn with_url_ttl(mut self, ttl: Duration) -> Self {
        self.url_ttl = ttl;
        self
    }

    /// Set how many access URLs are generated at once.
    pub fn with_url_fanout(mut self, fanout: usize) -> Self {
        self.url_fanout = fanout.max(1);
        self
    }

    /// List all files in creation order.
    pub async fn list_files(&self, page: Option<i64>, limit: Option<i64>) -> Result<FilePage> {
        let (page, limit) = normalize_paging(page, limit);
        let skip = (page - 1).saturating_mul(limit);

        let slice = self.catalog.list_files(skip, limit).await?;

        self.build_page(page, limit, slice).await
    }

    /// List files whose name contains `query`, ignoring case.
    pub async fn search_files(
        &self,
        query: &str,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> Result<FilePage> {
        let (page, limit) = normalize_paging(page, limit);
        let skip = (page - 1).saturating_mul(limit);

        let slice = self.catalog.search_files(query, skip, limit).await?;
        debug!("Search {:?} matched {} files", query, slice.total);

        self.build_page(page, limit, slice).await
    }

    async fn build_page(&self, page: u64, limit: u64, slice: FileSlice) -> Result<FilePage> {
        let files = self.with_access_urls(slice.files).await?;

        Ok(FilePage {
            current_page: page,
            total_pages: slice.total.div_ceil(limit),
            total_files: slice.total,
            files,
        })
    }

    /// Swap each record's blob key for a fresh access URL.
    ///
    /// URLs are generated concurrently, up to the configured fan-out, and all finish (or the
    /// first failure is returned) before this returns.
    async fn with_access_urls(&self, files: Vec<FileRecord>) -> Result<Vec<FileListing>> {
        let blobs = self.blobs.as_ref();
        let ttl = self.url_ttl;

        stream::iter(files)
            .map(move |file| async move {
                let url = blobs
                    .access_url(&file.blob_key, ttl)
                    .await
                    .map_err(|e| ArborError::blob(BlobOperation::Sign, &file.blob_key, e))?;
                Ok::<_, ArborError>(FileListing::new(file, url))
            })
            .buffered(self.url_fanout)
            .try_collect()
            .await
    }
}
