//! SQLite catalog implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{QueryBuilder, SqliteConnection, SqlitePool};

use super::{Catalog, FileRecord, FileSlice, FolderRecord};
use crate::db::Database;
use crate::{ArborError, Result};

const FILE_COLUMNS: &str = "id, name, blob_key, content_type, created_at";
const FOLDER_COLUMNS: &str = "id, name, parent_id, created_at";

/// Catalog stored in the arbor SQLite database.
#[derive(Clone)]
pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    /// Create a catalog over an opened database.
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }
}

/// Lowercase a name for case-insensitive matching.
pub(crate) fn fold_name(name: &str) -> String {
    name.to_lowercase()
}

/// Build a LIKE pattern matching `query` anywhere, with wildcards in the query taken literally.
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in fold_name(query).chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn to_sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Whether `err` is SQLite refusing a row whose referenced folder does not exist.
fn is_missing_folder(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(e) if e.is_foreign_key_violation())
}

async fn load_children(conn: &mut SqliteConnection, folder: &mut FolderRecord) -> Result<()> {
    folder.child_file_ids =
        sqlx::query_scalar("SELECT file_id FROM folder_files WHERE folder_id = ? ORDER BY position")
            .bind(&folder.id)
            .fetch_all(&mut *conn)
            .await?;

    folder.child_folder_ids = sqlx::query_scalar(
        "SELECT child_id FROM folder_children WHERE parent_id = ? ORDER BY position",
    )
    .bind(&folder.id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(())
}

async fn load_folder(conn: &mut SqliteConnection, id: &str) -> Result<Option<FolderRecord>> {
    let folder = sqlx::query_as::<_, FolderRecord>(&format!(
        "SELECT {FOLDER_COLUMNS} FROM folders WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    match folder {
        Some(mut folder) => {
            load_children(conn, &mut folder).await?;
            Ok(Some(folder))
        }
        None => Ok(None),
    }
}

#[async_trait]
impl Catalog for SqliteCatalog {
    async fn insert_folder(&self, folder: &FolderRecord) -> Result<()> {
        // Write first: a leading read pins a WAL snapshot, and a concurrent commit then fails
        // the write with SQLITE_BUSY_SNAPSHOT instead of waiting out the busy timeout. The
        // foreign key on `parent_id` checks the parent.
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO folders (id, name, parent_id, created_at) VALUES (?, ?, ?, ?)")
            .bind(&folder.id)
            .bind(&folder.name)
            .bind(&folder.parent_id)
            .bind(folder.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| match &folder.parent_id {
                Some(parent_id) if is_missing_folder(&e) => {
                    ArborError::ParentNotFound(parent_id.clone())
                }
                _ => e.into(),
            })?;

        if let Some(parent_id) = &folder.parent_id {
            sqlx::query("INSERT INTO folder_children (parent_id, child_id) VALUES (?, ?)")
                .bind(parent_id)
                .bind(&folder.id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_folder(&self, id: &str) -> Result<Option<FolderRecord>> {
        let mut tx = self.pool.begin().await?;
        let folder = load_folder(&mut tx, id).await?;
        tx.commit().await?;
        Ok(folder)
    }

    async fn get_folders(&self, ids: &[String]) -> Result<Vec<FolderRecord>> {
        let mut tx = self.pool.begin().await?;
        let mut folders = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(folder) = load_folder(&mut tx, id).await? {
                folders.push(folder);
            }
        }
        tx.commit().await?;
        Ok(folders)
    }

    async fn list_root_folders(&self) -> Result<Vec<FolderRecord>> {
        let mut tx = self.pool.begin().await?;
        let mut folders = sqlx::query_as::<_, FolderRecord>(&format!(
            "SELECT {FOLDER_COLUMNS} FROM folders WHERE parent_id IS NULL ORDER BY seq"
        ))
        .fetch_all(&mut *tx)
        .await?;

        for folder in &mut folders {
            load_children(&mut tx, folder).await?;
        }
        tx.commit().await?;
        Ok(folders)
    }

    async fn count_folders(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM folders")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn delete_folder(&self, id: &str) -> Result<bool> {
        // The parent's link row goes with the record (ON DELETE CASCADE). Remaining children
        // make this fail on their foreign keys.
        let result = sqlx::query("DELETE FROM folders WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_file(&self, file: &FileRecord, folder_id: Option<&str>) -> Result<()> {
        // Write first, as in `insert_folder`; the folder check is the link row's foreign key.
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO files (id, name, name_folded, blob_key, content_type, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&file.id)
        .bind(&file.name)
        .bind(fold_name(&file.name))
        .bind(&file.blob_key)
        .bind(&file.content_type)
        .bind(file.created_at)
        .execute(&mut *tx)
        .await?;

        if let Some(folder_id) = folder_id {
            sqlx::query("INSERT INTO folder_files (folder_id, file_id) VALUES (?, ?)")
                .bind(folder_id)
                .bind(&file.id)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    if is_missing_folder(&e) {
                        ArborError::folder_not_found(folder_id)
                    } else {
                        e.into()
                    }
                })?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_file(&self, id: &str) -> Result<Option<FileRecord>> {
        let file = sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(file)
    }

    async fn get_files(&self, ids: &[String]) -> Result<Vec<FileRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new(format!("SELECT {FILE_COLUMNS} FROM files WHERE id IN ("));
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");

        let files = query
            .build_query_as::<FileRecord>()
            .fetch_all(&self.pool)
            .await?;

        let mut by_id: HashMap<String, FileRecord> =
            files.into_iter().map(|f| (f.id.clone(), f)).collect();
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn delete_file(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_files(&self, skip: u64, limit: u64) -> Result<FileSlice> {
        let mut tx = self.pool.begin().await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files")
            .fetch_one(&mut *tx)
            .await?;
        let files = sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {FILE_COLUMNS} FROM files ORDER BY seq LIMIT ? OFFSET ?"
        ))
        .bind(to_sql_int(limit))
        .bind(to_sql_int(skip))
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(FileSlice {
            total: total as u64,
            files,
        })
    }

    async fn count_files(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn search_files(&self, query: &str, skip: u64, limit: u64) -> Result<FileSlice> {
        let pattern = like_pattern(query);
        let mut tx = self.pool.begin().await?;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM files WHERE name_folded LIKE ? ESCAPE '\\'")
                .bind(&pattern)
                .fetch_one(&mut *tx)
                .await?;
        let files = sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE name_folded LIKE ? ESCAPE '\\'
             ORDER BY seq LIMIT ? OFFSET ?"
        ))
        .bind(&pattern)
        .bind(to_sql_int(limit))
        .bind(to_sql_int(skip))
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(FileSlice {
            total: total as u64,
            files,
        })
    }
}

impl std::fmt::Debug for SqliteCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteCatalog").finish()
    }
}
