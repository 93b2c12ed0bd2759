//! Signed blob access for backends without native presigned URLs.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::header,
    response::Response,
};
use chrono::Utc;

use crate::error::BlobOperation;
use crate::web::dto::BlobAccessQuery;
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::ArborError;

/// GET /blobs/:key - Serve a blob behind a signed, expiring URL.
pub async fn serve_blob(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(access): Query<BlobAccessQuery>,
) -> Result<Response<Body>, ApiError> {
    let signer = state
        .signer
        .as_ref()
        .ok_or_else(|| ApiError::not_found("blob not found"))?;

    if !signer.verify(&key, access.expires, &access.signature, Utc::now().timestamp()) {
        return Err(ApiError::forbidden("invalid or expired signature"));
    }

    let content = state.blobs.get(&key).await.map_err(|e| {
        if e.is_not_found() {
            ApiError::not_found("blob not found")
        } else {
            ArborError::blob(BlobOperation::Get, &key, e).into()
        }
    })?;

    Response::builder()
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CACHE_CONTROL, "private, no-store")
        .body(Body::from_stream(content))
        .map_err(|e| {
            tracing::error!("Failed to build response: {}", e);
            ApiError::internal("Failed to build response")
        })
}
