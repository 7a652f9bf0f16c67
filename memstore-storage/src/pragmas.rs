//! Session pragmas applied to every connection on first open.

use rusqlite::Connection;

/// Applies the fixed set of session pragmas: WAL journaling (file-backed
/// databases only — in-memory databases ignore `journal_mode=WAL` and stay on
/// SQLite's default), foreign keys, normal sync, a 64MB page cache, and an
/// in-memory temp store.
pub fn apply_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    // SQLite silently keeps in-memory databases on their default journal mode
    // when WAL is requested, rather than erroring — no special-casing needed here.
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "cache_size", -64_000_i64)?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    Ok(())
}

/// Runs `SELECT 1` against the connection; used by the pool's checkout probe.
pub fn health_probe(conn: &Connection) -> bool {
    conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
        .is_ok()
}
