//! Test helpers for Web API integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::http::StatusCode;
use axum::Router;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use serde_json::{json, Value};

use arbor::storage::MemoryBlobStore;
use arbor::web::{create_router, AppState};
use arbor::{Database, SqliteCatalog};

/// Test server together with the blob store behind it.
pub struct TestApp {
    pub server: TestServer,
    pub blobs: Arc<MemoryBlobStore>,
}

/// Create a test server over an in-memory catalog and blob store.
pub async fn create_test_app() -> TestApp {
    create_test_app_with(|state| state).await
}

/// Create a test server, adjusting the application state first.
pub async fn create_test_app_with(configure: impl FnOnce(AppState) -> AppState) -> TestApp {
    let (router, blobs) = create_test_router(configure).await;
    let server = TestServer::new(router).expect("Failed to create test server");

    TestApp { server, blobs }
}

/// Build the bare router over an in-memory catalog and blob store.
///
/// For tests that need the raw response body rather than the buffered one a test server returns.
pub async fn create_test_router(
    configure: impl FnOnce(AppState) -> AppState,
) -> (Router, Arc<MemoryBlobStore>) {
    let db = Database::open_in_memory()
        .await
        .expect("Failed to create test database");
    let blobs = Arc::new(MemoryBlobStore::new());

    let state = configure(AppState::new(
        Arc::new(SqliteCatalog::new(&db)),
        blobs.clone(),
    ));
    (create_router(Arc::new(state), &[]), blobs)
}

/// Create a folder and return its id.
pub async fn create_folder(server: &TestServer, name: &str, parent_id: Option<&str>) -> String {
    let response = server
        .post("/api/folders")
        .json(&json!({ "name": name, "parent_id": parent_id }))
        .await;
    response.assert_status(StatusCode::CREATED);

    let body: Value = response.json();
    body["data"]["id"].as_str().unwrap().to_string()
}

/// Build a multipart form carrying one file.
pub fn file_form(name: &str, content_type: &str, content: &[u8]) -> MultipartForm {
    MultipartForm::new().add_part(
        "file",
        Part::bytes(content.to_vec())
            .file_name(name)
            .mime_type(content_type),
    )
}

/// Upload a file into a folder and return its id.
pub async fn upload_to_folder(
    server: &TestServer,
    folder_id: &str,
    name: &str,
    content: &[u8],
) -> String {
    let response = server
        .post(&format!("/api/folders/{}/files", folder_id))
        .multipart(file_form(name, "text/plain", content))
        .await;
    response.assert_status(StatusCode::CREATED);

    let body: Value = response.json();
    body["data"]["id"].as_str().unwrap().to_string()
}

/// Upload a file outside any folder and return its id.
pub async fn upload_file(server: &TestServer, name: &str, content: &[u8]) -> String {
    let response = server
        .post("/api/files")
        .multipart(file_form(name, "text/plain", content))
        .await;
    response.assert_status(StatusCode::CREATED);

    let body: Value = response.json();
    body["data"]["id"].as_str().unwrap().to_string()
}
