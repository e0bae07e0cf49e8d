//! Local store: keyed, asynchronous persistence for notes and habits.
//!
//! [`LocalStore`] owns a lazily opened SQLite connection. Every public
//! operation opens the database on first use, so callers never sequence an
//! explicit open step; [`LocalStore::initialize`] exists for callers that want
//! to surface an unavailable store early. Each operation runs in its own
//! transaction scoped to one collection, on a blocking worker thread.

pub mod error;
pub mod types;

pub use error::StoreError;
pub use types::{sort_newest_first, Collection, Habit, Note, Record};

use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

/// Where the journal database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    File(PathBuf),
    /// Private in-memory database, dropped with the last store clone.
    Memory,
}

impl StoreLocation {
    fn open(&self) -> Result<Connection, StoreError> {
        match self {
            Self::File(path) => crate::db::open_database(path),
            Self::Memory => crate::db::open_memory_database(),
        }
    }
}

/// Handle to the journal database. Clones share one connection.
#[derive(Clone)]
pub struct LocalStore {
    location: StoreLocation,
    conn: Arc<OnceCell<Arc<Mutex<Connection>>>>,
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore")
            .field("location", &self.location)
            .field("ready", &self.is_ready())
            .finish()
    }
}

impl LocalStore {
    pub fn new(location: StoreLocation) -> Self {
        Self {
            location,
            conn: Arc::new(OnceCell::new()),
        }
    }

    pub fn open_path(path: impl Into<PathBuf>) -> Self {
        Self::new(StoreLocation::File(path.into()))
    }

    pub fn in_memory() -> Self {
        Self::new(StoreLocation::Memory)
    }

    /// Whether the database has been opened.
    pub fn is_ready(&self) -> bool {
        self.conn.initialized()
    }

    /// Open the database and create the collections if needed.
    ///
    /// Safe to call repeatedly; once open, later calls return immediately.
    /// A failed open leaves the store closed, so the next call retries.
    pub async fn initialize(&self) -> Result<(), StoreError> {
        self.connection().await.map(|_| ())
    }

    /// All records of `R`'s collection, in no particular order.
    pub async fn list_all<R: Record>(&self) -> Result<Vec<R>, StoreError> {
        let collection = R::COLLECTION;
        let rows = self
            .with_conn(move |conn| {
                let tx = conn.transaction().map_err(tx_error("list", collection))?;
                let rows = {
                    let mut stmt = tx
                        .prepare(&format!("SELECT id, data FROM {collection}"))
                        .map_err(tx_error("list", collection))?;
                    stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
                        .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
                        .map_err(tx_error("list", collection))?
                };
                tx.commit().map_err(tx_error("list", collection))?;
                Ok(rows)
            })
            .await?;

        tracing::debug!(%collection, count = rows.len(), "listed records");

        rows.into_iter()
            .map(|(id, data)| decode(collection, id, &data))
            .collect()
    }

    /// Fetch one record by id.
    pub async fn get<R: Record>(&self, id: &str) -> Result<Option<R>, StoreError> {
        let collection = R::COLLECTION;
        let id = id.to_string();
        let row = self
            .with_conn({
                let id = id.clone();
                move |conn| {
                    let tx = conn.transaction().map_err(tx_error("get", collection))?;
                    let data: Option<String> = tx
                        .query_row(
                            &format!("SELECT data FROM {collection} WHERE id = ?1"),
                            params![id],
                            |row| row.get(0),
                        )
                        .optional()
                        .map_err(tx_error("get", collection))?;
                    tx.commit().map_err(tx_error("get", collection))?;
                    Ok(data)
                }
            })
            .await?;

        row.map(|data| decode(collection, id, &data)).transpose()
    }

    /// Insert or replace `record` under its id.
    pub async fn put<R: Record>(&self, record: &R) -> Result<(), StoreError> {
        let collection = R::COLLECTION;
        let id = record.id().to_string();
        let data = serde_json::to_string(record).map_err(|source| StoreError::Corrupt {
            collection,
            id: id.clone(),
            source,
        })?;

        self.with_conn({
            let id = id.clone();
            move |conn| {
                let tx = conn.transaction().map_err(tx_error("put", collection))?;
                tx.execute(
                    &format!("INSERT OR REPLACE INTO {collection} (id, data) VALUES (?1, ?2)"),
                    params![id, data],
                )
                .map_err(tx_error("put", collection))?;
                tx.commit().map_err(tx_error("put", collection))
            }
        })
        .await?;

        tracing::debug!(%collection, id = %id, "record stored");
        Ok(())
    }

    /// Remove the record with `id`. Removing an absent id is not an error.
    pub async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        let key = id.to_string();
        let removed = self
            .with_conn(move |conn| {
                let tx = conn.transaction().map_err(tx_error("delete", collection))?;
                let removed = tx
                    .execute(&format!("DELETE FROM {collection} WHERE id = ?1"), params![key])
                    .map_err(tx_error("delete", collection))?;
                tx.commit().map_err(tx_error("delete", collection))?;
                Ok(removed)
            })
            .await?;

        tracing::debug!(%collection, id, removed, "record deleted");
        Ok(())
    }

    async fn connection(&self) -> Result<Arc<Mutex<Connection>>, StoreError> {
        let conn = self
            .conn
            .get_or_try_init(|| async {
                let location = self.location.clone();
                let conn = tokio::task::spawn_blocking(move || location.open()).await??;
                tracing::info!(location = ?self.location, "local store ready");
                Ok::<_, StoreError>(Arc::new(Mutex::new(conn)))
            })
            .await?;
        Ok(Arc::clone(conn))
    }

    /// Run `f` against the open connection on a blocking worker.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = self.connection().await?;
        tokio::task::spawn_blocking(move || {
            // A panic mid-operation rolled back its transaction, so the connection is still sound
            let mut guard = conn.lock().unwrap_or_else(|e| e.into_inner());
            f(&mut guard)
        })
        .await?
    }
}

fn tx_error(op: &'static str, collection: Collection) -> impl Fn(rusqlite::Error) -> StoreError {
    move |source| StoreError::Write {
        op,
        collection,
        source,
    }
}

fn decode<R: Record>(collection: Collection, id: String, data: &str) -> Result<R, StoreError> {
    serde_json::from_str(data).map_err(|source| StoreError::Corrupt {
        collection,
        id,
        source,
    })
}
