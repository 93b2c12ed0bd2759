//! File handlers for Web API.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};

use crate::web::dto::{ApiResponse, FilePageResponse, FileResponse, PaginationQuery, SearchQuery};
use crate::web::error::ApiError;
use crate::web::handlers::{content_disposition_header, read_upload, AppState};

/// POST /api/files - Upload a file that belongs to no folder.
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<FileResponse>>), ApiError> {
    let upload = read_upload(multipart).await?;

    let file = state
        .files
        .upload(upload.content, &upload.name, Some(&upload.content_type))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(FileResponse::from(file))),
    ))
}

/// GET /api/files - List files, one page at a time.
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<ApiResponse<FilePageResponse>>, ApiError> {
    let page = state
        .query
        .list_files(pagination.page, pagination.limit)
        .await?;
    Ok(Json(ApiResponse::new(page.into())))
}

/// GET /api/files/search - Search files by name.
pub async fn search_files(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<ApiResponse<FilePageResponse>>, ApiError> {
    let page = state
        .query
        .search_files(&query.q, query.page, query.limit)
        .await?;
    Ok(Json(ApiResponse::new(page.into())))
}

/// GET /api/files/:id - Get file metadata.
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
) -> Result<Json<ApiResponse<FileResponse>>, ApiError> {
    let file = state.files.get(&file_id).await?;
    Ok(Json(ApiResponse::new(file.into())))
}

/// GET /api/files/:id/download - Download file content.
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
) -> Result<Response<Body>, ApiError> {
    let opened = state.files.open(&file_id).await?;

    Response::builder()
        .header(header::CONTENT_TYPE, &opened.record.content_type)
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_header(&opened.record.name),
        )
        .body(Body::from_stream(opened.content))
        .map_err(|e| {
            tracing::error!("Failed to build response: {}", e);
            ApiError::internal("Failed to build response")
        })
}

/// DELETE /api/files/:id - Delete a file.
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.files.delete(&file_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
