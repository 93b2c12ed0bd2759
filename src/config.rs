//! Configuration module for arbor.

use serde::Deserialize;
use std::path::Path;

use crate::{ArborError, Result};

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum upload size in megabytes.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size_mb: u64,
    /// Allowed CORS origins. Empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_max_upload_size() -> u64 {
    50
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_size_mb: default_max_upload_size(),
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Maximum upload size in bytes.
    pub fn max_upload_bytes(&self) -> usize {
        (self.max_upload_size_mb as usize).saturating_mul(1024 * 1024)
    }
}

/// Catalog database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/arbor.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Which blob store backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Sharded local directory with signed URLs served by this process.
    Local,
    /// S3-compatible object storage with presigned URLs.
    S3,
    /// In-process memory; contents are lost on exit.
    Memory,
}

/// Blob storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Backend selection.
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,
    /// Directory for the local backend.
    #[serde(default = "default_local_path")]
    pub local_path: String,
    /// Public base URL used when signing local access URLs.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    /// Secret for signing local access URLs.
    #[serde(default)]
    pub signing_secret: String,
    /// S3 bucket name.
    #[serde(default)]
    pub bucket: Option<String>,
    /// S3 region.
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom S3 endpoint (MinIO and other compatible stores).
    #[serde(default)]
    pub endpoint_url: Option<String>,
    /// Use path-style bucket addressing.
    #[serde(default)]
    pub force_path_style: bool,
    /// Static S3 access key id; falls back to the default provider chain when unset.
    #[serde(default)]
    pub access_key_id: Option<String>,
    /// Static S3 secret access key.
    #[serde(default)]
    pub secret_access_key: Option<String>,
}

fn default_backend() -> StorageBackend {
    StorageBackend::Local
}

fn default_local_path() -> String {
    "data/blobs".to_string()
}

fn default_public_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            local_path: default_local_path(),
            public_base_url: default_public_base_url(),
            signing_secret: String::new(),
            bucket: None,
            region: default_region(),
            endpoint_url: None,
            force_path_style: false,
            access_key_id: None,
            secret_access_key: None,
        }
    }
}

/// Catalog query configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    /// Lifetime of issued access URLs in seconds.
    #[serde(default = "default_access_url_ttl")]
    pub access_url_ttl_secs: u64,
    /// Maximum number of access URLs issued concurrently for one page.
    #[serde(default = "default_url_fanout")]
    pub url_fanout: usize,
}

fn default_access_url_ttl() -> u64 {
    3600
}

fn default_url_fanout() -> usize {
    8
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            access_url_ttl_secs: default_access_url_ttl(),
            url_fanout: default_url_fanout(),
        }
    }
}

/// Archive entry compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveCompression {
    Deflate,
    Stored,
}

/// Archive export configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveConfig {
    /// Number of blobs opened ahead of the one being compressed.
    #[serde(default = "default_prefetch")]
    pub prefetch: usize,
    /// Entry compression method.
    #[serde(default = "default_compression")]
    pub compression: ArchiveCompression,
    /// Size of the in-process pipe between the exporter and the response body, in KiB.
    #[serde(default = "default_pipe_buffer")]
    pub pipe_buffer_kb: usize,
}

fn default_prefetch() -> usize {
    2
}

fn default_compression() -> ArchiveCompression {
    ArchiveCompression::Deflate
}

fn default_pipe_buffer() -> usize {
    64
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            prefetch: default_prefetch(),
            compression: default_compression(),
            pipe_buffer_kb: default_pipe_buffer(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/arbor.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ArborError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| ArborError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `ARBOR_SIGNING_SECRET`: secret for local access URLs
    /// - `ARBOR_S3_ACCESS_KEY_ID` / `ARBOR_S3_SECRET_ACCESS_KEY`: static S3 credentials
    pub fn apply_env_overrides(&mut self) {
        if let Some(secret) = non_empty_env("ARBOR_SIGNING_SECRET") {
            self.storage.signing_secret = secret;
        }
        if let Some(id) = non_empty_env("ARBOR_S3_ACCESS_KEY_ID") {
            self.storage.access_key_id = Some(id);
        }
        if let Some(secret) = non_empty_env("ARBOR_S3_SECRET_ACCESS_KEY") {
            self.storage.secret_access_key = Some(secret);
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        match self.storage.backend {
            StorageBackend::Local if self.storage.signing_secret.is_empty() => {
                return Err(ArborError::Config(
                    "local storage requires signing_secret. \
                     Set it in config.toml or via ARBOR_SIGNING_SECRET."
                        .to_string(),
                ));
            }
            StorageBackend::S3 if self.storage.bucket.as_deref().unwrap_or("").is_empty() => {
                return Err(ArborError::Config(
                    "s3 storage requires storage.bucket".to_string(),
                ));
            }
            _ => {}
        }

        if self.archive.prefetch == 0 {
            return Err(ArborError::Config(
                "archive.prefetch must be at least 1".to_string(),
            ));
        }
        if self.catalog.url_fanout == 0 {
            return Err(ArborError::Config(
                "catalog.url_fanout must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
