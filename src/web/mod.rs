//! HTTP API for arbor.
//!
//! Exposes the folder tree, file listing and search, single-file downloads and streaming
//! folder archives as a JSON REST API.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use handlers::AppState;
pub use router::create_router;
pub use server::WebServer;
