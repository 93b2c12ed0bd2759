//! Folder handlers for Web API.

use std::io;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Multipart, Path, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::io::DuplexStream;
use tokio::task::JoinHandle;
use tokio_util::io::ReaderStream;

use crate::file::ExportSummary;
use crate::web::dto::{
    ApiResponse, CreateFolderRequest, FileResponse, FolderContentsResponse, FolderResponse,
};
use crate::web::error::ApiError;
use crate::web::handlers::{content_disposition_header, read_upload, AppState};

/// GET /api/folders/root - List root folders.
pub async fn list_root_folders(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<FolderResponse>>>, ApiError> {
    let folders = state.tree.list_root_folders().await?;
    let response = folders.into_iter().map(FolderResponse::from).collect();
    Ok(Json(ApiResponse::new(response)))
}

/// POST /api/folders - Create a folder.
pub async fn create_folder(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateFolderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<FolderResponse>>), ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let folder = state
        .tree
        .create_folder(&request.name, request.parent_id.as_deref())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(FolderResponse::from(folder))),
    ))
}

/// GET /api/folders/:id - List a folder's direct files and subfolders.
pub async fn get_folder_contents(
    State(state): State<Arc<AppState>>,
    Path(folder_id): Path<String>,
) -> Result<Json<ApiResponse<FolderContentsResponse>>, ApiError> {
    let contents = state.tree.list_folder_contents(&folder_id).await?;
    Ok(Json(ApiResponse::new(contents.into())))
}

/// DELETE /api/folders/:id - Delete a folder and its whole subtree.
pub async fn delete_folder(
    State(state): State<Arc<AppState>>,
    Path(folder_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.tree.delete_folder(&folder_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/folders/:id/files - Upload a file into a folder.
pub async fn upload_to_folder(
    State(state): State<Arc<AppState>>,
    Path(folder_id): Path<String>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<FileResponse>>), ApiError> {
    let upload = read_upload(multipart).await?;

    let file = state
        .tree
        .create_file(
            &folder_id,
            upload.content,
            &upload.name,
            Some(&upload.content_type),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(FileResponse::from(file))),
    ))
}

/// GET /api/folders/:id/archive - Download a folder's subtree as a ZIP archive.
///
/// The archive is written by a background task into a bounded pipe that the response body
/// drains, so a slow client slows the export down. Errors after the headers are sent end the
/// body abruptly, which clients see as a truncated download.
pub async fn download_archive(
    State(state): State<Arc<AppState>>,
    Path(folder_id): Path<String>,
) -> Result<Response<Body>, ApiError> {
    let plan = state.archive.plan(&folder_id).await?;
    let filename = format!("{}.zip", plan.root_name());

    let (writer, reader) = tokio::io::duplex(state.pipe_buffer);
    let exporter = state.archive.clone();
    let export = tokio::spawn(async move { exporter.write(plan, writer).await });

    Response::builder()
        .header(header::CONTENT_TYPE, "application/zip")
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_header(&filename),
        )
        .body(Body::from_stream(archive_body(reader, export)))
        .map_err(|e| {
            tracing::error!("Failed to build response: {}", e);
            ApiError::internal("Failed to build response")
        })
}

/// Stream the pipe's contents, then surface the export's outcome.
fn archive_body(
    reader: DuplexStream,
    export: JoinHandle<crate::Result<ExportSummary>>,
) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
    async_stream::stream! {
        let mut chunks = ReaderStream::new(reader);
        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(chunk) => yield Ok(chunk),
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }

        // The writer side closes on success and on failure alike.
        match export.await {
            Ok(Ok(summary)) => {
                tracing::debug!("Archive streamed: {} entries", summary.entries);
            }
            Ok(Err(e)) => {
                tracing::error!("Archive export failed mid-stream: {}", e);
                yield Err(io::Error::other(e.to_string()));
            }
            Err(e) => {
                tracing::error!("Archive export task failed: {}", e);
                yield Err(io::Error::other(e.to_string()));
            }
        }
    }
}
