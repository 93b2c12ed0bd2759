//! Streaming ZIP export of a folder subtree.
//!
//! Export runs in two phases. Planning walks the catalog and lists every file in the subtree
//! with its archive path. Writing then opens each blob in plan order, copies it into the
//! archive chunk by chunk and moves on, so at most `prefetch` blobs are open at any time and
//! content is never buffered whole.

use std::collections::HashSet;
use std::sync::Arc;

use async_zip::base::write::ZipFileWriter;
use async_zip::{Compression, ZipEntryBuilder};
use futures::{stream, AsyncWriteExt as _, StreamExt};
use tokio::io::{AsyncWrite, AsyncWriteExt as _};
use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::config::ArchiveCompression;
use crate::error::BlobOperation;
use crate::storage::BlobStore;
use crate::{ArborError, Result};

/// Blobs opened ahead of the one being written, by default.
pub const DEFAULT_PREFETCH: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
struct PlannedEntry {
    path: String,
    file_id: String,
    blob_key: String,
}

/// The files of a subtree, in archive order.
#[derive(Debug, Clone)]
pub struct ArchivePlan {
    root_name: String,
    entries: Vec<PlannedEntry>,
}

impl ArchivePlan {
    /// Name of the folder the archive is built from.
    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    /// Number of files that will be written.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the subtree holds no files.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Archive paths in write order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.path.as_str())
    }
}

/// What an export wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    /// Archive entries written.
    pub entries: usize,
    /// Uncompressed bytes copied from blobs.
    pub bytes: u64,
}

/// Make a name usable as one archive path segment.
fn sanitize_segment(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();

    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}

/// Return `path`, or `path` with a " (n)" suffix before the extension if already taken.
fn unique_path(used: &mut HashSet<String>, dir: &str, name: &str) -> String {
    let mut path = format!("{dir}/{name}");
    if used.insert(path.clone()) {
        return path;
    }

    let (stem, ext) = match name.rfind('.') {
        Some(pos) if pos > 0 => (&name[..pos], &name[pos..]),
        _ => (name, ""),
    };

    let mut n = 1;
    loop {
        path = format!("{dir}/{stem} ({n}){ext}");
        if used.insert(path.clone()) {
            return path;
        }
        n += 1;
    }
}

impl From<ArchiveCompression> for Compression {
    fn from(value: ArchiveCompression) -> Self {
        match value {
            ArchiveCompression::Deflate => Compression::Deflate,
            ArchiveCompression::Stored => Compression::Stored,
        }
    }
}

/// Exporter writing folder subtrees as ZIP archives.
#[derive(Clone)]
pub struct ArchiveExporter {
    catalog: Arc<dyn Catalog>,
    blobs: Arc<dyn BlobStore>,
    prefetch: usize,
    compression: ArchiveCompression,
}

impl ArchiveExporter {
    /// Create a new ArchiveExporter using deflate and the default prefetch.
    pub fn new(catalog: Arc<dyn Catalog>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            catalog,
            blobs,
            prefetch: DEFAULT_PREFETCH,
            compression: ArchiveCompression::Deflate,
        }
    }

    /// Set how many blobs may be open ahead of the writer.
    pub fn with_prefetch(mut self, prefetch: usize) -> Self {
        self.prefetch = prefetch.max(1);
        self
    }

    /// Set the entry compression method.
    pub fn with_compression(mut self, compression: ArchiveCompression) -> Self {
        self.compression = compression;
        self
    }

    /// Export `folder_id`'s subtree into `sink`.
    pub async fn export<W>(&self, folder_id: &str, sink: W) -> Result<ExportSummary>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let plan = self.plan(folder_id).await?;
        self.write(plan, sink).await
    }

    /// List the subtree's files in archive order.
    ///
    /// Folders are walked depth first; a folder's own files come before its subfolders. Every
    /// path starts with the root folder's name.
    pub async fn plan(&self, folder_id: &str) -> Result<ArchivePlan> {
        let root = self
            .catalog
            .get_folder(folder_id)
            .await?
            .ok_or_else(|| ArborError::folder_not_found(folder_id))?;

        let root_name = root.name.clone();
        let mut entries = Vec::new();
        let mut used = HashSet::new();
        let mut stack = vec![(root, sanitize_segment(&root_name))];

        while let Some((folder, dir)) = stack.pop() {
            for file in self.catalog.get_files(&folder.child_file_ids).await? {
                entries.push(PlannedEntry {
                    path: unique_path(&mut used, &dir, &sanitize_segment(&file.name)),
                    file_id: file.id,
                    blob_key: file.blob_key,
                });
            }

            let children = self.catalog.get_folders(&folder.child_folder_ids).await?;
            for child in children.into_iter().rev() {
                let child_dir = format!("{dir}/{}", sanitize_segment(&child.name));
                stack.push((child, child_dir));
            }
        }

        debug!("Planned archive of {} with {} entries", folder_id, entries.len());
        Ok(ArchivePlan { root_name, entries })
    }

    /// Write a planned archive into `sink`.
    ///
    /// Fails on the first blob or sink error. Bytes already written stay in the sink and form
    /// an incomplete archive with no central directory; callers must treat it as failed.
    pub async fn write<W>(&self, plan: ArchivePlan, sink: W) -> Result<ExportSummary>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let root_name = plan.root_name;
        let mut writer = ZipFileWriter::with_tokio(sink);
        let mut summary = ExportSummary::default();

        let blobs = self.blobs.as_ref();
        let mut opened = stream::iter(plan.entries)
            .map(move |entry| async move {
                let content = blobs
                    .get(&entry.blob_key)
                    .await
                    .map_err(|e| ArborError::blob(BlobOperation::Get, &entry.blob_key, e));
                (entry, content)
            })
            .buffered(self.prefetch);

        while let Some((entry, content)) = opened.next().await {
            let mut content = content?;
            let builder = ZipEntryBuilder::new(entry.path.clone().into(), self.compression.into());
            let mut entry_writer = writer.write_entry_stream(builder).await?;

            while let Some(chunk) = content.next().await {
                let chunk = chunk
                    .map_err(|e| ArborError::blob(BlobOperation::Get, &entry.blob_key, e))?;
                entry_writer.write_all(&chunk).await?;
                summary.bytes += chunk.len() as u64;
            }

            entry_writer.close().await?;
            summary.entries += 1;
            debug!("Archived file {} as {}", entry.file_id, entry.path);
        }

        let mut sink = writer.close().await?.into_inner();
        sink.flush().await?;
        sink.shutdown().await?;

        info!(
            "Exported {} as archive: {} entries, {} bytes",
            root_name, summary.entries, summary.bytes
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use async_zip::base::read::mem::ZipFileReader;
    use bytes::Bytes;

    use super::*;
    use crate::catalog::{FileRecord, SqliteCatalog};
    use crate::db::Database;
    use crate::file::FolderTreeManager;
    use crate::storage::MemoryBlobStore;

    struct Fixture {
        exporter: ArchiveExporter,
        tree: FolderTreeManager,
        blobs: Arc<MemoryBlobStore>,
    }

    async fn setup() -> Fixture {
        let db = Database::open_in_memory().await.unwrap();
        let catalog: Arc<dyn Catalog> = Arc::new(SqliteCatalog::new(&db));
        let blobs = Arc::new(MemoryBlobStore::new());
        Fixture {
            exporter: ArchiveExporter::new(catalog.clone(), blobs.clone()),
            tree: FolderTreeManager::new(catalog, blobs.clone()),
            blobs,
        }
    }

    async fn add_file(fx: &Fixture, folder_id: &str, name: &str, content: &[u8]) -> FileRecord {
        fx.tree
            .create_file(folder_id, Bytes::copy_from_slice(content), name, None)
            .await
            .unwrap()
    }

    async fn read_entries(data: Vec<u8>) -> Vec<(String, Vec<u8>)> {
        let reader = ZipFileReader::new(data).await.unwrap();
        let mut entries = Vec::new();
        for index in 0..reader.file().entries().len() {
            let name = reader.file().entries()[index]
                .filename()
                .as_str()
                .unwrap()
                .to_string();
            let mut content = Vec::new();
            let mut entry_reader = reader.reader_with_entry(index).await.unwrap();
            entry_reader.read_to_end_checked(&mut content).await.unwrap();
            entries.push((name, content));
        }
        entries
    }

    /// Docs{readme.md, 2024{jan.csv, q1{report.pdf}}, 2025{plan.txt}}
    async fn build_tree(fx: &Fixture) -> String {
        let docs = fx.tree.create_folder("Docs", None).await.unwrap();
        add_file(fx, &docs.id, "readme.md", b"# readme").await;
        let y2024 = fx.tree.create_folder("2024", Some(&docs.id)).await.unwrap();
        add_file(fx, &y2024.id, "jan.csv", b"a,b\n1,2\n").await;
        let q1 = fx.tree.create_folder("q1", Some(&y2024.id)).await.unwrap();
        add_file(fx, &q1.id, "report.pdf", &vec![42u8; 100_000]).await;
        let y2025 = fx.tree.create_folder("2025", Some(&docs.id)).await.unwrap();
        add_file(fx, &y2025.id, "plan.txt", b"plan").await;
        docs.id
    }

    #[test]
    fn test_sanitize_segment() {
        assert_eq!(sanitize_segment("a/b\\c"), "a_b_c");
        assert_eq!(sanitize_segment(".."), "_");
        assert_eq!(sanitize_segment("."), "_");
        assert_eq!(sanitize_segment("normal.txt"), "normal.txt");
    }

    #[test]
    fn test_unique_path() {
        let mut used = HashSet::new();
        assert_eq!(unique_path(&mut used, "A", "x.txt"), "A/x.txt");
        assert_eq!(unique_path(&mut used, "A", "x.txt"), "A/x (1).txt");
        assert_eq!(unique_path(&mut used, "A", "x.txt"), "A/x (2).txt");
        assert_eq!(unique_path(&mut used, "A", ".env"), "A/.env");
        assert_eq!(unique_path(&mut used, "A", ".env"), "A/.env (1)");
        assert_eq!(unique_path(&mut used, "B", "x.txt"), "B/x.txt");
    }

    #[tokio::test]
    async fn test_plan_order_is_depth_first() {
        let fx = setup().await;
        let docs = build_tree(&fx).await;

        let plan = fx.exporter.plan(&docs).await.unwrap();
        assert_eq!(plan.root_name(), "Docs");
        let paths: Vec<_> = plan.paths().collect();
        assert_eq!(
            paths,
            vec![
                "Docs/readme.md",
                "Docs/2024/jan.csv",
                "Docs/2024/q1/report.pdf",
                "Docs/2025/plan.txt",
            ]
        );
    }

    #[tokio::test]
    async fn test_export_writes_every_file() {
        let fx = setup().await;
        let docs = build_tree(&fx).await;

        let mut buf = Vec::new();
        let summary = fx.exporter.export(&docs, &mut buf).await.unwrap();
        assert_eq!(summary.entries, 4);
        assert_eq!(summary.bytes, 8 + 8 + 100_000 + 4);

        let entries = read_entries(buf).await;
        let names: Vec<_> = entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Docs/readme.md",
                "Docs/2024/jan.csv",
                "Docs/2024/q1/report.pdf",
                "Docs/2025/plan.txt",
            ]
        );
        assert_eq!(entries[2].1, vec![42u8; 100_000]);
        assert_eq!(entries[3].1, b"plan");
    }

    #[tokio::test]
    async fn test_export_stored_compression() {
        let fx = setup().await;
        let docs = build_tree(&fx).await;
        let exporter = fx
            .exporter
            .clone()
            .with_compression(ArchiveCompression::Stored)
            .with_prefetch(1);

        let mut buf = Vec::new();
        exporter.export(&docs, &mut buf).await.unwrap();
        assert!(buf.len() > 100_000);
        assert_eq!(read_entries(buf).await.len(), 4);
    }

    #[tokio::test]
    async fn test_export_subfolder_uses_its_name_as_root() {
        let fx = setup().await;
        let docs = fx.tree.create_folder("Docs", None).await.unwrap();
        let sub = fx.tree.create_folder("Sub", Some(&docs.id)).await.unwrap();
        add_file(&fx, &sub.id, "a.txt", b"a").await;
        add_file(&fx, &docs.id, "outside.txt", b"b").await;

        let mut buf = Vec::new();
        fx.exporter.export(&sub.id, &mut buf).await.unwrap();
        let entries = read_entries(buf).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "Sub/a.txt");
    }

    #[tokio::test]
    async fn test_export_empty_folder() {
        let fx = setup().await;
        let empty = fx.tree.create_folder("Empty", None).await.unwrap();

        let mut buf = Vec::new();
        let summary = fx.exporter.export(&empty.id, &mut buf).await.unwrap();
        assert_eq!(summary, ExportSummary::default());
        assert!(read_entries(buf).await.is_empty());
    }

    #[tokio::test]
    async fn test_export_missing_folder_writes_nothing() {
        let fx = setup().await;
        let mut buf = Vec::new();
        assert!(matches!(
            fx.exporter.export("missing", &mut buf).await,
            Err(ArborError::NotFound { .. })
        ));
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_names_get_suffixes() {
        let fx = setup().await;
        let folder = fx.tree.create_folder("F", None).await.unwrap();
        add_file(&fx, &folder.id, "same.txt", b"1").await;
        add_file(&fx, &folder.id, "same.txt", b"2").await;

        let plan = fx.exporter.plan(&folder.id).await.unwrap();
        let paths: Vec<_> = plan.paths().collect();
        assert_eq!(paths, vec!["F/same.txt", "F/same (1).txt"]);
    }

    #[tokio::test]
    async fn test_midstream_failure_leaves_incomplete_archive() {
        let fx = setup().await;
        let docs = build_tree(&fx).await;
        let plan = fx.exporter.plan(&docs).await.unwrap();
        assert_eq!(plan.len(), 4);

        // Fail while copying the large file.
        let report_key = {
            let contents = fx.tree.list_folder_contents(&docs).await.unwrap();
            let y2024 = &contents.folders[0];
            let q1 = fx.tree.list_folder_contents(&y2024.id).await.unwrap().folders[0].clone();
            fx.tree.list_folder_contents(&q1.id).await.unwrap().files[0]
                .blob_key
                .clone()
        };
        fx.blobs.fail_get_midstream(&report_key);

        let mut buf = Vec::new();
        let result = fx.exporter.write(plan, &mut buf).await;
        assert!(matches!(
            result,
            Err(ArborError::BlobStore {
                operation: BlobOperation::Get,
                ..
            })
        ));
        assert!(!buf.is_empty());
        assert!(ZipFileReader::new(buf).await.is_err());
    }

    #[tokio::test]
    async fn test_failure_stops_further_fetches() {
        let fx = setup().await;
        let folder = fx.tree.create_folder("F", None).await.unwrap();
        let first = add_file(&fx, &folder.id, "first.txt", b"1").await;
        for i in 0..10 {
            add_file(&fx, &folder.id, &format!("more{i}.txt"), b"x").await;
        }
        fx.blobs.fail_get(&first.blob_key);

        let exporter = fx.exporter.clone().with_prefetch(2);
        let mut buf = Vec::new();
        assert!(exporter.export(&folder.id, &mut buf).await.is_err());
        assert!(fx.blobs.get_count() <= 2);
    }

    #[tokio::test]
    async fn test_closed_sink_aborts_export() {
        let fx = setup().await;
        let docs = build_tree(&fx).await;

        let (writer, reader) = tokio::io::duplex(1024);
        drop(reader);

        let result = fx.exporter.export(&docs, writer).await;
        assert!(result.is_err());
        assert!(fx.blobs.get_count() <= 3);
    }
}
