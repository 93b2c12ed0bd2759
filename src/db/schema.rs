//! Catalog schema and migrations.
//!
//! Migrations are applied in order when the database is opened. The
//! schema_version table tracks which have been applied.

/// Database migrations.
///
/// Child sets are link tables so that adding or removing one child is a single-row write.
/// Foreign keys keep both ends honest: a folder row cannot be deleted while it still has
/// linked files or subfolders, and deleting a file or folder drops the link that points to it.
pub const MIGRATIONS: &[&str] = &[
    // v1: folders, files and the child-set link tables
    r#"
CREATE TABLE folders (
    seq         INTEGER PRIMARY KEY AUTOINCREMENT,
    id          TEXT NOT NULL UNIQUE,
    name        TEXT NOT NULL,
    parent_id   TEXT REFERENCES folders(id),
    created_at  TEXT NOT NULL
);

CREATE INDEX idx_folders_parent ON folders(parent_id);

CREATE TABLE files (
    seq          INTEGER PRIMARY KEY AUTOINCREMENT,
    id           TEXT NOT NULL UNIQUE,
    name         TEXT NOT NULL,
    name_folded  TEXT NOT NULL,            -- lowercased name for case-insensitive search
    blob_key     TEXT NOT NULL UNIQUE,
    content_type TEXT NOT NULL,
    created_at   TEXT NOT NULL
);

CREATE TABLE folder_files (
    position    INTEGER PRIMARY KEY AUTOINCREMENT,
    folder_id   TEXT NOT NULL REFERENCES folders(id),
    file_id     TEXT NOT NULL REFERENCES files(id) ON DELETE CASCADE,
    UNIQUE (folder_id, file_id)
);

CREATE INDEX idx_folder_files_file ON folder_files(file_id);

CREATE TABLE folder_children (
    position    INTEGER PRIMARY KEY AUTOINCREMENT,
    parent_id   TEXT NOT NULL REFERENCES folders(id),
    child_id    TEXT NOT NULL REFERENCES folders(id) ON DELETE CASCADE,
    UNIQUE (parent_id, child_id)
);

CREATE INDEX idx_folder_children_child ON folder_children(child_id);
"#,
];
