//! Typed errors for the local store.

use thiserror::Error;

use super::types::Collection;

/// Failure modes of [`LocalStore`](super::LocalStore) operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database could not be opened or its schema could not be created.
    #[error("storage unavailable: {context}")]
    Unavailable {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The database file was written by a newer schema than this build knows.
    #[error("storage unavailable: schema version {found} is newer than supported version {supported}")]
    SchemaTooNew { found: u32, supported: u32 },

    /// A single-collection transaction failed. The mutation did not happen.
    #[error("{op} on {collection} failed: {source}")]
    Write {
        op: &'static str,
        collection: Collection,
        #[source]
        source: rusqlite::Error,
    },

    /// A stored payload no longer deserializes into its record type.
    #[error("corrupt record {id} in {collection}: {source}")]
    Corrupt {
        collection: Collection,
        id: String,
        #[source]
        source: serde_json::Error,
    },

    /// The blocking task running the operation panicked or was cancelled.
    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl StoreError {
    pub(crate) fn unavailable(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Unavailable {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Whether the store as a whole is unusable, as opposed to one failed operation.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::SchemaTooNew { .. })
    }
}
