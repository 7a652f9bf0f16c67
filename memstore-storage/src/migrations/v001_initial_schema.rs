//! Schema v1: `rules`, `project_docs`, `refs`, and their indexes.
//! `updated_at` is stamped by the row-storage layer on every write (an
//! RFC3339 string with sub-second precision), not by a trigger — SQLite's
//! `CURRENT_TIMESTAMP` is naive, second-resolution, and not RFC3339, which
//! would both break ordering for same-second mutations and fail to parse
//! back out. `schema_migrations` itself is created once, outside the
//! versioned migration table, since it must exist before `current_version`
//! can be queried.

use rusqlite::Connection;

use memstore_core::{MemStoreError, MemStoreResult};

pub fn migrate(conn: &Connection) -> MemStoreResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at DATETIME,
            description TEXT
        );

        CREATE TABLE rules (
            id TEXT PRIMARY KEY,
            content TEXT NOT NULL,
            embedding BLOB,
            tags TEXT NOT NULL DEFAULT '[]',
            tier INTEGER CHECK (tier BETWEEN 1 AND 5),
            metadata TEXT,
            created_at DATETIME,
            updated_at DATETIME
        );

        CREATE INDEX idx_rules_tier ON rules (tier);
        CREATE INDEX idx_rules_created_at ON rules (created_at);
        CREATE INDEX idx_rules_updated_at ON rules (updated_at);

        CREATE TABLE project_docs (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            file_path TEXT,
            embedding BLOB,
            tags TEXT NOT NULL DEFAULT '[]',
            metadata TEXT,
            created_at DATETIME,
            updated_at DATETIME
        );

        CREATE INDEX idx_project_docs_project_id ON project_docs (project_id);
        CREATE INDEX idx_project_docs_created_at ON project_docs (created_at);
        CREATE INDEX idx_project_docs_updated_at ON project_docs (updated_at);

        CREATE TABLE refs (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            content TEXT NOT NULL,
            embedding BLOB,
            channel_id TEXT,
            metadata TEXT,
            created_at DATETIME,
            updated_at DATETIME
        );

        CREATE INDEX idx_refs_channel_id ON refs (channel_id);
        CREATE INDEX idx_refs_name ON refs (name);
        CREATE INDEX idx_refs_created_at ON refs (created_at);
        CREATE INDEX idx_refs_updated_at ON refs (updated_at);
        ",
    )
    .map_err(|e| MemStoreError::Storage(e.to_string()))
}
