//! Offline cache proxy.
//!
//! Intercepts outbound requests and answers them cache-first from a versioned
//! asset cache:
//! - install fetches a fixed manifest into the namespace of the current version
//! - activation evicts every other namespace
//! - misses go to the network and successful GETs are stored on the way back
//! - navigations fall back to the cached shell document when offline
//!
//! Storage and network are injected through [`CacheStorage`] and [`Network`].

mod error;
mod network;
mod proxy;
mod storage;
mod types;

pub use error::{CacheError, NetworkError};
pub use network::{HttpNetwork, Network};
pub use proxy::{CacheProxy, ProxyConfig, ProxyState, SyncOutcome, SYNC_NOTES_TAG};
pub use storage::{CacheStorage, MemoryCacheStorage, SqliteCacheStorage};
pub use types::{CacheKey, ProxyRequest, ProxyResponse, RequestMode};
