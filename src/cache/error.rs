//! Typed errors for the offline cache proxy.

use thiserror::Error;

use super::proxy::ProxyState;

/// A fetch that never produced a response (offline, DNS, refused, reset).
#[derive(Debug, Error)]
#[error("fetch {url} failed: {source}")]
pub struct NetworkError {
    pub url: String,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl NetworkError {
    pub fn new(url: impl Into<String>, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self {
            url: url.into(),
            source: Box::new(source),
        }
    }

    /// The host has no connectivity at all.
    pub fn offline(url: impl Into<String>) -> Self {
        Self::new(
            url,
            std::io::Error::new(std::io::ErrorKind::NotConnected, "network unreachable"),
        )
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    /// At least one manifest asset could not be fetched; nothing was stored.
    #[error("install of cache {version} failed: {} of {total} assets unavailable (first: {})", .failures.len(), first_failure(.failures))]
    InstallFailed {
        version: String,
        total: usize,
        failures: Vec<(String, String)>,
    },

    /// Cache miss and the network fetch failed.
    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("cache storage error: {context}")]
    Storage {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("cannot {action} while proxy is {state}")]
    InvalidState {
        action: &'static str,
        state: ProxyState,
    },

    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl CacheError {
    pub(crate) fn storage(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

fn first_failure(failures: &[(String, String)]) -> String {
    failures
        .first()
        .map(|(asset, reason)| format!("{asset}: {reason}"))
        .unwrap_or_default()
}
