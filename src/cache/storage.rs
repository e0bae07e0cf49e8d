//! Cache storage trait with SQLite and in-memory implementations.
//!
//! Entries live in named namespaces, one per deployed cache version, and are
//! keyed by [`CacheKey`] (method plus absolute URL).

use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::error::CacheError;
use super::types::{CacheKey, ProxyResponse};

/// Trait for cache storage backends.
pub trait CacheStorage: Send + Sync + 'static {
    /// Exact lookup in one namespace.
    fn lookup(&self, namespace: &str, key: &CacheKey) -> Result<Option<ProxyResponse>, CacheError>;

    /// Store one entry, creating the namespace if needed.
    fn store(&self, namespace: &str, key: &CacheKey, response: &ProxyResponse) -> Result<(), CacheError>;

    /// Store a batch of entries atomically: all of them or none.
    fn store_all(&self, namespace: &str, entries: &[(CacheKey, ProxyResponse)]) -> Result<(), CacheError>;

    /// Names of every namespace currently held.
    fn namespaces(&self) -> Result<Vec<String>, CacheError>;

    /// Drop a namespace and its entries. Returns whether it existed.
    fn delete_namespace(&self, namespace: &str) -> Result<bool, CacheError>;

    /// Number of entries in a namespace.
    fn len(&self, namespace: &str) -> Result<usize, CacheError>;
}

/// Process-local storage. Contents vanish on exit.
#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    namespaces: Mutex<BTreeMap<String, HashMap<CacheKey, ProxyResponse>>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, HashMap<CacheKey, ProxyResponse>>> {
        self.namespaces.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CacheStorage for MemoryCacheStorage {
    fn lookup(&self, namespace: &str, key: &CacheKey) -> Result<Option<ProxyResponse>, CacheError> {
        Ok(self
            .lock()
            .get(namespace)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    fn store(&self, namespace: &str, key: &CacheKey, response: &ProxyResponse) -> Result<(), CacheError> {
        self.lock()
            .entry(namespace.to_string())
            .or_default()
            .insert(key.clone(), response.clone());
        Ok(())
    }

    fn store_all(&self, namespace: &str, entries: &[(CacheKey, ProxyResponse)]) -> Result<(), CacheError> {
        let mut namespaces = self.lock();
        let target = namespaces.entry(namespace.to_string()).or_default();
        for (key, response) in entries {
            target.insert(key.clone(), response.clone());
        }
        Ok(())
    }

    fn namespaces(&self) -> Result<Vec<String>, CacheError> {
        Ok(self.lock().keys().cloned().collect())
    }

    fn delete_namespace(&self, namespace: &str) -> Result<bool, CacheError> {
        Ok(self.lock().remove(namespace).is_some())
    }

    fn len(&self, namespace: &str) -> Result<usize, CacheError> {
        Ok(self.lock().get(namespace).map_or(0, HashMap::len))
    }
}

/// SQLite-based cache storage.
pub struct SqliteCacheStorage {
    conn: Mutex<Connection>,
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cache_namespaces (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS cache_entries (
    namespace TEXT NOT NULL REFERENCES cache_namespaces(name) ON DELETE CASCADE,
    method TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    headers TEXT NOT NULL,
    body BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (namespace, method, url)
);
"#;

impl SqliteCacheStorage {
    /// Open or create the cache database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CacheError::storage(format!("failed to create directory {}", parent.display()), e)
            })?;
        }

        let conn = Connection::open(path).map_err(|e| {
            CacheError::storage(format!("failed to open cache database at {}", path.display()), e)
        })?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| CacheError::storage("failed to enable WAL", e))?;

        let storage = Self::from_connection(conn)?;
        tracing::info!(path = %path.display(), "asset cache opened");
        Ok(storage)
    }

    /// Open a throwaway in-memory cache database.
    pub fn open_in_memory() -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CacheError::storage("failed to open in-memory cache", e))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, CacheError> {
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| CacheError::storage("failed to enable foreign keys", e))?;
        conn.execute_batch(CACHE_SCHEMA)
            .map_err(|e| CacheError::storage("failed to create cache tables", e))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn ensure_namespace(conn: &Connection, namespace: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO cache_namespaces (name) VALUES (?1)",
        params![namespace],
    )?;
    Ok(())
}

fn insert_entry(
    conn: &Connection,
    namespace: &str,
    key: &CacheKey,
    response: &ProxyResponse,
) -> Result<(), CacheError> {
    let headers = serde_json::to_string(&response.headers)
        .map_err(|e| CacheError::storage("failed to encode headers", e))?;
    conn.execute(
        "INSERT OR REPLACE INTO cache_entries (namespace, method, url, status, headers, body, cached_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, datetime('now'))",
        params![namespace, key.method, key.url, response.status, headers, response.body],
    )
    .map_err(|e| CacheError::storage(format!("failed to store {key}"), e))?;
    Ok(())
}

impl CacheStorage for SqliteCacheStorage {
    fn lookup(&self, namespace: &str, key: &CacheKey) -> Result<Option<ProxyResponse>, CacheError> {
        let conn = self.lock();
        let row: Option<(u16, String, Vec<u8>)> = conn
            .query_row(
                "SELECT status, headers, body FROM cache_entries
                 WHERE namespace = ?1 AND method = ?2 AND url = ?3",
                params![namespace, key.method, key.url],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(|e| CacheError::storage(format!("failed to look up {key}"), e))?;

        row.map(|(status, headers, body)| {
            let headers = serde_json::from_str(&headers)
                .map_err(|e| CacheError::storage(format!("corrupt headers for {key}"), e))?;
            Ok(ProxyResponse {
                status,
                headers,
                body,
            })
        })
        .transpose()
    }

    fn store(&self, namespace: &str, key: &CacheKey, response: &ProxyResponse) -> Result<(), CacheError> {
        self.store_all(namespace, std::slice::from_ref(&(key.clone(), response.clone())))
    }

    fn store_all(&self, namespace: &str, entries: &[(CacheKey, ProxyResponse)]) -> Result<(), CacheError> {
        let mut conn = self.lock();
        let tx = conn
            .transaction()
            .map_err(|e| CacheError::storage("failed to begin transaction", e))?;

        ensure_namespace(&tx, namespace)
            .map_err(|e| CacheError::storage(format!("failed to create namespace {namespace}"), e))?;
        for (key, response) in entries {
            insert_entry(&tx, namespace, key, response)?;
        }

        tx.commit()
            .map_err(|e| CacheError::storage("failed to commit transaction", e))
    }

    fn namespaces(&self) -> Result<Vec<String>, CacheError> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare("SELECT name FROM cache_namespaces ORDER BY name")
            .map_err(|e| CacheError::storage("failed to prepare namespace query", e))?;
        let names = stmt
            .query_map([], |row| row.get(0))
            .and_then(|rows| rows.collect::<Result<Vec<String>, _>>())
            .map_err(|e| CacheError::storage("failed to list namespaces", e))?;
        Ok(names)
    }

    fn delete_namespace(&self, namespace: &str) -> Result<bool, CacheError> {
        let conn = self.lock();
        // Entries go with the namespace row via ON DELETE CASCADE
        let removed = conn
            .execute("DELETE FROM cache_namespaces WHERE name = ?1", params![namespace])
            .map_err(|e| CacheError::storage(format!("failed to delete namespace {namespace}"), e))?;
        Ok(removed > 0)
    }

    fn len(&self, namespace: &str) -> Result<usize, CacheError> {
        let conn = self.lock();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM cache_entries WHERE namespace = ?1",
                params![namespace],
                |row| row.get(0),
            )
            .map_err(|e| CacheError::storage(format!("failed to count {namespace}"), e))?;
        Ok(count as usize)
    }
}
