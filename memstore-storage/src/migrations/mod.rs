//! Migration runner — version tracking, forward-only, transactional per migration.

mod v001_initial_schema;

use rusqlite::Connection;
use tracing::{debug, info, warn};

use memstore_core::{MemStoreError, MemStoreResult};

/// Total number of declared migrations.
pub const LATEST_VERSION: u32 = 1;

type MigrationFn = fn(&Connection) -> MemStoreResult<()>;

const MIGRATIONS: [(u32, &str, MigrationFn); 1] =
    [(1, "initial_schema", v001_initial_schema::migrate)];

/// Returns the current schema version, or 0 if `schema_migrations` does not
/// exist yet — the very first run on a fresh database.
pub fn current_version(conn: &Connection) -> MemStoreResult<u32> {
    let exists: bool = conn
        .prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_migrations'")
        .and_then(|mut stmt| stmt.exists([]))
        .map_err(|e| MemStoreError::Storage(e.to_string()))?;

    if !exists {
        return Ok(0);
    }

    let version: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| MemStoreError::Storage(e.to_string()))?;

    Ok(version)
}

/// Runs every pending migration in ascending version order, each wrapped in
/// its own transaction. Stops at the first failure, leaving the committed
/// prefix intact and returning `MigrationFailed`.
pub fn run_migrations(conn: &Connection) -> MemStoreResult<u32> {
    let current = current_version(conn)?;
    let mut applied = 0;

    if current >= LATEST_VERSION {
        debug!(current, "schema is up to date");
        return Ok(0);
    }

    info!(from = current, to = LATEST_VERSION, "running migrations");

    for &(version, name, migrate_fn) in &MIGRATIONS {
        if version <= current {
            continue;
        }

        debug!(version, name, "applying migration");

        conn.execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| MemStoreError::Storage(format!("begin v{version:03}: {e}")))?;

        match migrate_fn(conn) {
            Ok(()) => {
                conn.execute(
                    "INSERT INTO schema_migrations (version, applied_at, description) \
                     VALUES (?1, CURRENT_TIMESTAMP, ?2)",
                    rusqlite::params![version, name],
                )
                .map_err(|e| MemStoreError::Storage(format!("record v{version:03}: {e}")))?;

                conn.execute_batch("COMMIT")
                    .map_err(|e| MemStoreError::Storage(format!("commit v{version:03}: {e}")))?;

                info!(version, name, "applied migration");
                applied += 1;
            }
            Err(e) => {
                warn!(version, error = %e, "migration failed, rolling back");
                let _ = conn.execute_batch("ROLLBACK");
                return Err(MemStoreError::MigrationFailed {
                    version,
                    reason: e.to_string(),
                });
            }
        }
    }

    info!(applied, now_at = LATEST_VERSION, "migrations complete");
    Ok(applied)
}

/// Runs `initialize_schema` semantics: a no-op on an already-current database.
pub fn initialize_schema(conn: &Connection) -> MemStoreResult<u32> {
    run_migrations(conn)
}
