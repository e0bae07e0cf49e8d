pub mod schema;

use rusqlite::Connection;
use std::path::Path;

use crate::store::StoreError;

/// Open (or create) the journal database at the given path with the schema
/// initialized and its version checked.
pub fn open_database(path: impl AsRef<Path>) -> Result<Connection, StoreError> {
    let path = path.as_ref();

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            StoreError::unavailable(format!("failed to create directory {}", parent.display()), e)
        })?;
    }

    let conn = Connection::open(path).map_err(|e| {
        StoreError::unavailable(format!("failed to open database at {}", path.display()), e)
    })?;

    // WAL keeps readers unblocked while a write transaction is open
    conn.pragma_update(None, "journal_mode", "WAL")
        .map_err(|e| StoreError::unavailable("failed to enable WAL", e))?;
    conn.pragma_update(None, "busy_timeout", 5000)
        .map_err(|e| StoreError::unavailable("failed to set busy timeout", e))?;

    prepare(&conn)?;

    tracing::info!(path = %path.display(), "database initialized");
    Ok(conn)
}

/// Open an in-memory database. Contents vanish when the connection drops.
pub fn open_memory_database() -> Result<Connection, StoreError> {
    let conn = Connection::open_in_memory()
        .map_err(|e| StoreError::unavailable("failed to open in-memory database", e))?;
    prepare(&conn)?;
    Ok(conn)
}

fn prepare(conn: &Connection) -> Result<(), StoreError> {
    // INSERT OR IGNORE keeps an existing version, so a newer file is still detected
    schema::init_schema(conn)
        .map_err(|e| StoreError::unavailable("failed to initialize schema", e))?;
    let version = schema::check_schema_version(conn)?;
    tracing::debug!(schema_version = version, "schema ready");
    Ok(())
}
