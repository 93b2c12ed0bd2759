//! Request DTOs for Web API.

use serde::Deserialize;

/// Folder creation request.
#[derive(Debug, Deserialize)]
pub struct CreateFolderRequest {
    /// Folder name.
    pub name: String,
    /// Parent folder ID; omitted or null for a root folder.
    #[serde(default)]
    pub parent_id: Option<String>,
}

/// Pagination query parameters.
///
/// Missing or non-positive values fall back to page 1 and 10 per page.
#[derive(Debug, Default, Deserialize)]
pub struct PaginationQuery {
    /// 1-based page number.
    pub page: Option<i64>,
    /// Items per page.
    pub limit: Option<i64>,
}

/// File search query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    /// Substring to look for in file names, ignoring case.
    #[serde(default)]
    pub q: String,
    /// 1-based page number.
    pub page: Option<i64>,
    /// Items per page.
    pub limit: Option<i64>,
}

/// Query parameters of a signed blob URL.
#[derive(Debug, Deserialize)]
pub struct BlobAccessQuery {
    /// Expiry as a Unix timestamp.
    pub expires: i64,
    /// Hex signature over the key and expiry.
    pub signature: String,
}
