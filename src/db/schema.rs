//! SQL DDL for the journal database.
//!
//! Two independent keyed collections, `notes` and `habits`, each mapping a
//! record `id` to its JSON payload, plus `schema_meta` for the schema version.
//! All DDL uses `IF NOT EXISTS` for idempotent initialization.

use rusqlite::{Connection, OptionalExtension};

use crate::store::StoreError;

/// The schema version that the current binary writes and reads.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS notes (
    id TEXT PRIMARY KEY,
    data TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS habits (
    id TEXT PRIMARY KEY,
    data TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
        [CURRENT_SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

/// Get the stored schema version, or `None` on a database without one.
pub fn get_schema_version(conn: &Connection) -> rusqlite::Result<Option<u32>> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'schema_version'",
        [],
        |row| {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().unwrap_or(0))
        },
    )
    .optional()
}

/// Refuse to touch a database written by a newer schema.
pub fn check_schema_version(conn: &Connection) -> Result<u32, StoreError> {
    let found = get_schema_version(conn)
        .map_err(|e| StoreError::unavailable("failed to read schema version", e))?
        .unwrap_or(CURRENT_SCHEMA_VERSION);

    if found > CURRENT_SCHEMA_VERSION {
        return Err(StoreError::SchemaTooNew {
            found,
            supported: CURRENT_SCHEMA_VERSION,
        });
    }

    Ok(found)
}
