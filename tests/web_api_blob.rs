//! Web API Blob Tests
//!
//! Integration tests for signed access URLs served by the local backend.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::Value;
use tempfile::TempDir;

use arbor::storage::{LocalBlobStore, UrlSigner};
use arbor::web::{create_router, AppState};
use arbor::{Database, SqliteCatalog};

const BASE_URL: &str = "http://files.example.com";

async fn create_local_server() -> (TestServer, UrlSigner, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::open_in_memory().await.unwrap();
    let signer = UrlSigner::new("test-signing-secret", BASE_URL).unwrap();
    let blobs = LocalBlobStore::new(temp_dir.path(), signer.clone())
        .await
        .unwrap();

    let state = AppState::new(Arc::new(SqliteCatalog::new(&db)), Arc::new(blobs))
        .with_signer(signer.clone());
    let server = TestServer::new(create_router(Arc::new(state), &[])).unwrap();

    (server, signer, temp_dir)
}

/// Path and query of an absolute access URL, for requests against the test server.
fn local_path(access_url: &str) -> String {
    let url = url::Url::parse(access_url).unwrap();
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

async fn first_listed_url(server: &TestServer) -> String {
    let body: Value = server.get("/api/files").await.json();
    body["data"]["files"][0]["url"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_listing_url_serves_content() {
    let (server, _signer, _dir) = create_local_server().await;
    common::upload_file(&server, "a.txt", b"signed content").await;

    let url = first_listed_url(&server).await;
    assert!(url.starts_with("http://files.example.com/blobs/"));

    let response = server.get(&local_path(&url)).await;

    response.assert_status_ok();
    assert_eq!(response.header("cache-control"), "private, no-store");
    assert_eq!(response.as_bytes().as_ref(), b"signed content");
}

#[tokio::test]
async fn test_tampered_signature_rejected() {
    let (server, _signer, _dir) = create_local_server().await;
    common::upload_file(&server, "a.txt", b"x").await;

    let url = first_listed_url(&server).await;
    let tampered = format!("{}0", local_path(&url));

    let response = server.get(&tampered).await;

    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_expired_url_rejected() {
    let (server, signer, _dir) = create_local_server().await;
    common::upload_file(&server, "a.txt", b"x").await;

    let url = first_listed_url(&server).await;
    let key = url::Url::parse(&url)
        .unwrap()
        .path_segments()
        .unwrap()
        .last()
        .unwrap()
        .to_string();
    let expired = signer.sign_until(&key, 1).unwrap();

    let response = server.get(&local_path(&expired)).await;

    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_signed_url_for_missing_blob() {
    let (server, signer, _dir) = create_local_server().await;
    let url = signer
        .sign("0123456789abcdef", std::time::Duration::from_secs(60))
        .unwrap();

    let response = server.get(&local_path(&url)).await;

    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_blob_route_disabled_without_signer() {
    let app = common::create_test_app().await;

    let response = app
        .server
        .get("/blobs/abc?expires=9999999999&signature=00")
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_blob_route_missing_query() {
    let (server, _signer, _dir) = create_local_server().await;

    let response = server.get("/blobs/abc").await;

    response.assert_status(StatusCode::BAD_REQUEST);
}
