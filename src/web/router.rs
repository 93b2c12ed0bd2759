//! Router configuration for Web API.

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use super::dto::HealthResponse;
use super::handlers::{
    create_folder, delete_file, delete_folder, download_archive, download_file, get_file,
    get_folder_contents, list_files, list_root_folders, search_files, serve_blob, upload_file,
    upload_to_folder, AppState,
};
use super::middleware::create_cors_layer;

/// Create the main router.
pub fn create_router(app_state: Arc<AppState>, cors_origins: &[String]) -> Router {
    // Multipart framing needs some room on top of the file itself.
    let body_limit = app_state.max_upload_size.saturating_add(64 * 1024);

    let folder_routes = Router::new()
        .route("/", post(create_folder))
        .route("/root", get(list_root_folders))
        .route("/:id", get(get_folder_contents).delete(delete_folder))
        .route("/:id/files", post(upload_to_folder))
        .route("/:id/archive", get(download_archive));

    let file_routes = Router::new()
        .route("/", get(list_files).post(upload_file))
        .route("/search", get(search_files))
        .route("/:id", get(get_file).delete(delete_file))
        .route("/:id/download", get(download_file));

    let api_routes = Router::new()
        .nest("/folders", folder_routes)
        .nest("/files", file_routes);

    Router::new()
        .nest("/api", api_routes)
        .route("/blobs/:key", get(serve_blob))
        .route("/health", get(health_check))
        // Cors answers preflights with a default body, so it sits inside the body limit.
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(body_limit))
                .layer(create_cors_layer(cors_origins))
                .layer(DefaultBodyLimit::disable()),
        )
        .with_state(app_state)
}

/// Health check handler.
async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        storage: state.blobs.backend_name(),
    })
}
