//! arbor - Hierarchical storage catalog
//!
//! Folders and files kept in a SQLite catalog, file contents kept in a blob store,
//! with paginated listing, name search and streaming ZIP export of folder subtrees.

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod file;
pub mod logging;
pub mod storage;
pub mod web;

pub use catalog::{Catalog, FileRecord, FileSlice, FolderRecord, SqliteCatalog};
pub use config::Config;
pub use db::Database;
pub use error::{ArborError, Result};
pub use file::{
    ArchiveExporter, CatalogQueryService, DeleteReport, FileService, FolderContents,
    FolderTreeManager,
};
pub use storage::{BlobStore, LocalBlobStore, MemoryBlobStore, S3BlobStore};
