//! Cache-first request interceptor with a versioned install/activate lifecycle.

use reqwest::{Method, Url};
use std::sync::{Arc, Mutex};

use super::error::CacheError;
use super::network::Network;
use super::storage::CacheStorage;
use super::types::{ProxyRequest, ProxyResponse};
use crate::config::CacheConfig;

/// Tag of the deferred task that pushes unsynced notes.
pub const SYNC_NOTES_TAG: &str = "sync-notes";

/// URL schemes of browser extensions. Never cached.
const EXTENSION_SCHEMES: &[&str] = &["chrome-extension", "moz-extension", "safari-extension"];

/// Lifecycle of one cache version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyState {
    /// Created, nothing fetched yet.
    Parsed,
    Installing,
    /// Manifest stored; waiting for activation.
    Installed,
    Activating,
    /// Intercepting requests.
    Active,
    /// Install failed. This version will never serve.
    Redundant,
}

impl ProxyState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parsed => "parsed",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Active => "active",
            Self::Redundant => "redundant",
        }
    }
}

impl std::fmt::Display for ProxyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the deferred sync hook did with a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Handled,
    Ignored,
}

/// Static settings of one deployed cache version.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Namespace name. Every other namespace is evicted on activation.
    pub version: String,
    /// Origin that relative manifest entries resolve against.
    pub origin: Url,
    pub manifest: Vec<String>,
    pub shell_url: String,
    pub bypass_hosts: Vec<String>,
}

impl ProxyConfig {
    pub fn from_config(config: &CacheConfig) -> Result<Self, CacheError> {
        let origin = Url::parse(&config.upstream).map_err(|e| CacheError::InvalidUrl {
            url: config.upstream.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            version: config.version.clone(),
            origin,
            manifest: config.manifest.clone(),
            shell_url: config.shell_url.clone(),
            bypass_hosts: config.bypass_hosts.clone(),
        })
    }

    /// Resolve a manifest entry or path against the origin. Absolute URLs pass through.
    pub fn resolve(&self, path: &str) -> Result<Url, CacheError> {
        self.origin.join(path).map_err(|e| CacheError::InvalidUrl {
            url: path.to_string(),
            reason: e.to_string(),
        })
    }

    /// Whether `url` targets a host that must never be intercepted.
    pub fn is_bypassed(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        self.bypass_hosts.iter().any(|bypass| {
            host.eq_ignore_ascii_case(bypass)
                || host
                    .to_ascii_lowercase()
                    .ends_with(&format!(".{}", bypass.to_ascii_lowercase()))
        })
    }
}

/// Request interceptor answering from a versioned asset cache.
///
/// Dispatch order while active: bypass list, cache, network (storing
/// cacheable responses), then the shell fallback for navigations.
pub struct CacheProxy<S: CacheStorage, N: Network> {
    config: ProxyConfig,
    storage: Arc<S>,
    network: Arc<N>,
    state: Arc<Mutex<ProxyState>>,
}

impl<S: CacheStorage, N: Network> Clone for CacheProxy<S, N> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            storage: Arc::clone(&self.storage),
            network: Arc::clone(&self.network),
            state: Arc::clone(&self.state),
        }
    }
}

impl<S: CacheStorage, N: Network> CacheProxy<S, N> {
    pub fn new(config: ProxyConfig, storage: S, network: N) -> Self {
        Self {
            config,
            storage: Arc::new(storage),
            network: Arc::new(network),
            state: Arc::new(Mutex::new(ProxyState::Parsed)),
        }
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    pub fn state(&self) -> ProxyState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, next: ProxyState) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let prev = *state;
        tracing::debug!(version = %self.config.version, from = %prev, to = %next, "proxy state change");
        *state = next;
    }

    /// Move to `next` only if the current state is one of `allowed`.
    fn transition(
        &self,
        action: &'static str,
        allowed: &[ProxyState],
        next: ProxyState,
    ) -> Result<(), CacheError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !allowed.contains(&*state) {
            return Err(CacheError::InvalidState {
                action,
                state: *state,
            });
        }
        *state = next;
        Ok(())
    }

    /// Fetch every manifest asset and store them under the current version.
    ///
    /// All assets are fetched before anything is written, so a failure leaves
    /// the namespace untouched and the proxy `Redundant`. Any 2xx answer counts
    /// as fetched. Returns the number of assets stored.
    pub async fn install(&self) -> Result<usize, CacheError> {
        self.transition(
            "install",
            &[ProxyState::Parsed, ProxyState::Redundant],
            ProxyState::Installing,
        )?;
        let version = self.config.version.clone();
        tracing::info!(%version, assets = self.config.manifest.len(), "installing asset cache");

        let mut fetched = Vec::with_capacity(self.config.manifest.len());
        let mut failures = Vec::new();
        for asset in &self.config.manifest {
            let url = match self.config.resolve(asset) {
                Ok(url) => url,
                Err(e) => {
                    failures.push((asset.clone(), e.to_string()));
                    continue;
                }
            };
            let request = ProxyRequest::get(url);
            match self.network.fetch(&request).await {
                Ok(response) if response.is_success() => fetched.push((request.cache_key(), response)),
                Ok(response) => failures.push((asset.clone(), format!("HTTP {}", response.status))),
                Err(e) => failures.push((asset.clone(), e.to_string())),
            }
        }

        if !failures.is_empty() {
            self.set_state(ProxyState::Redundant);
            let err = CacheError::InstallFailed {
                version,
                total: self.config.manifest.len(),
                failures,
            };
            tracing::warn!(error = %err, "asset cache install failed");
            return Err(err);
        }

        let stored = fetched.len();
        let namespace = version.clone();
        if let Err(e) = self
            .with_storage(move |storage| storage.store_all(&namespace, &fetched))
            .await
        {
            self.set_state(ProxyState::Redundant);
            return Err(e);
        }

        self.set_state(ProxyState::Installed);
        tracing::info!(%version, stored, "asset cache installed");
        Ok(stored)
    }

    /// Evict every namespace except the current version and start intercepting.
    ///
    /// Returns the names of the evicted namespaces.
    pub async fn activate(&self) -> Result<Vec<String>, CacheError> {
        self.transition("activate", &[ProxyState::Installed], ProxyState::Activating)?;

        let evicted = match self.evict_stale().await {
            Ok(evicted) => evicted,
            Err(e) => {
                self.set_state(ProxyState::Installed);
                return Err(e);
            }
        };

        self.set_state(ProxyState::Active);
        tracing::info!(version = %self.config.version, evicted = evicted.len(), "asset cache active");
        Ok(evicted)
    }

    /// Go straight to `Active` when this version was installed by an earlier run.
    ///
    /// The earlier run may have stopped before activating, so stale namespaces
    /// are evicted here as well. Returns `false`, leaving the state alone, when
    /// the namespace is absent and a fresh install is needed.
    pub async fn resume(&self) -> Result<bool, CacheError> {
        let version = self.config.version.clone();
        let namespaces = self.with_storage(|storage| storage.namespaces()).await?;
        if !namespaces.contains(&version) {
            return Ok(false);
        }
        self.transition("resume", &[ProxyState::Parsed], ProxyState::Activating)?;

        let evicted = match self.evict_stale().await {
            Ok(evicted) => evicted,
            Err(e) => {
                self.set_state(ProxyState::Parsed);
                return Err(e);
            }
        };

        self.set_state(ProxyState::Active);
        tracing::info!(%version, evicted = evicted.len(), "resumed installed asset cache");
        Ok(true)
    }

    async fn evict_stale(&self) -> Result<Vec<String>, CacheError> {
        let version = self.config.version.clone();
        self.with_storage(move |storage| {
            let mut evicted = Vec::new();
            for namespace in storage.namespaces()? {
                if namespace == version {
                    continue;
                }
                storage.delete_namespace(&namespace)?;
                tracing::info!(%namespace, "evicted stale cache");
                evicted.push(namespace);
            }
            Ok(evicted)
        })
        .await
    }

    /// Answer one intercepted request.
    pub async fn handle(&self, request: ProxyRequest) -> Result<ProxyResponse, CacheError> {
        if self.state() != ProxyState::Active {
            return Ok(self.network.fetch(&request).await?);
        }

        if self.config.is_bypassed(&request.url) {
            tracing::trace!(url = %request.url, "bypassing cache");
            return Ok(self.network.fetch(&request).await?);
        }

        let key = request.cache_key();
        let lookup = {
            let (version, key) = (self.config.version.clone(), key.clone());
            self.with_storage(move |storage| storage.lookup(&version, &key)).await
        };
        match lookup {
            Ok(Some(cached)) => {
                tracing::debug!(%key, "cache hit");
                return Ok(cached);
            }
            Ok(None) => tracing::debug!(%key, "cache miss"),
            Err(e) => tracing::warn!(%key, error = %e, "cache lookup failed, trying network"),
        }

        match self.network.fetch(&request).await {
            Ok(response) => {
                if is_cacheable(&request, &response) {
                    let version = self.config.version.clone();
                    let (stored_key, copy) = (key.clone(), response.clone());
                    // Best effort: the caller still gets the response
                    if let Err(e) = self
                        .with_storage(move |storage| storage.store(&version, &stored_key, &copy))
                        .await
                    {
                        tracing::warn!(%key, error = %e, "failed to cache response");
                    }
                }
                Ok(response)
            }
            Err(err) => {
                if request.is_navigation() {
                    if let Some(shell) = self.shell().await {
                        tracing::info!(url = %request.url, "offline, serving cached shell");
                        return Ok(shell);
                    }
                }
                tracing::debug!(error = %err, "network fetch failed with no fallback");
                Err(CacheError::Network(err))
            }
        }
    }

    async fn shell(&self) -> Option<ProxyResponse> {
        let url = self.config.resolve(&self.config.shell_url).ok()?;
        let key = ProxyRequest::get(url).cache_key();
        let version = self.config.version.clone();
        match self
            .with_storage(move |storage| storage.lookup(&version, &key))
            .await
        {
            Ok(shell) => shell,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read cached shell");
                None
            }
        }
    }

    /// Run `f` against the storage on a blocking worker.
    async fn with_storage<T, F>(&self, f: F) -> Result<T, CacheError>
    where
        T: Send + 'static,
        F: FnOnce(&S) -> Result<T, CacheError> + Send + 'static,
    {
        let storage = Arc::clone(&self.storage);
        tokio::task::spawn_blocking(move || f(&storage))
            .await
            .map_err(|e| CacheError::storage("cache storage task failed", e))?
    }

    /// Deferred sync hook, run when connectivity returns.
    ///
    /// There is no remote to push to, so `sync-notes` only records the intent.
    pub async fn sync(&self, tag: &str) -> SyncOutcome {
        if tag == SYNC_NOTES_TAG {
            tracing::info!(tag, "background sync: would push unsynced notes");
            SyncOutcome::Handled
        } else {
            tracing::debug!(tag, "ignoring unknown sync tag");
            SyncOutcome::Ignored
        }
    }
}

/// Only successful GETs from ordinary origins are stored.
fn is_cacheable(request: &ProxyRequest, response: &ProxyResponse) -> bool {
    request.method == Method::GET
        && response.status == 200
        && !EXTENSION_SCHEMES.contains(&request.url.scheme())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::error::NetworkError;
    use crate::cache::storage::MemoryCacheStorage;
    use crate::cache::types::RequestMode;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves fixed bodies by URL; everything else is offline.
    #[derive(Default)]
    struct FakeNetwork {
        routes: HashMap<String, ProxyResponse>,
        calls: AtomicUsize,
    }

    impl FakeNetwork {
        fn with(mut self, url: &str, response: ProxyResponse) -> Self {
            self.routes.insert(url.to_string(), response);
            self
        }
    }

    #[async_trait]
    impl Network for FakeNetwork {
        async fn fetch(&self, request: &ProxyRequest) -> Result<ProxyResponse, NetworkError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.routes
                .get(request.url.as_str())
                .cloned()
                .ok_or_else(|| NetworkError::offline(request.url.as_str()))
        }
    }

    fn config(manifest: &[&str]) -> ProxyConfig {
        ProxyConfig {
            version: "v1".into(),
            origin: Url::parse("http://app.local").unwrap(),
            manifest: manifest.iter().map(|s| s.to_string()).collect(),
            shell_url: "/index.html".into(),
            bypass_hosts: vec!["generativelanguage.googleapis.com".into()],
        }
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn bypass_matches_host_and_subdomains() {
        let cfg = config(&[]);
        assert!(cfg.is_bypassed(&url("https://generativelanguage.googleapis.com/v1beta/x")));
        assert!(cfg.is_bypassed(&url("https://eu.generativelanguage.googleapis.com/")));
        assert!(!cfg.is_bypassed(&url("https://googleapis.com/")));
        assert!(!cfg.is_bypassed(&url("http://app.local/")));
    }

    #[test]
    fn resolve_keeps_absolute_urls() {
        let cfg = config(&[]);
        assert_eq!(cfg.resolve("/index.html").unwrap().as_str(), "http://app.local/index.html");
        assert_eq!(
            cfg.resolve("https://cdn.example.com/a.css").unwrap().as_str(),
            "https://cdn.example.com/a.css"
        );
    }

    #[test]
    fn only_plain_successful_gets_are_cacheable() {
        let ok = ProxyResponse::new(200, "x");
        let get = ProxyRequest::get(url("http://app.local/a.js"));
        assert!(is_cacheable(&get, &ok));
        assert!(!is_cacheable(&get, &ProxyResponse::new(404, "x")));
        assert!(!is_cacheable(&get, &ProxyResponse::new(206, "x")));

        let post = ProxyRequest::new(Method::POST, url("http://app.local/a"), RequestMode::Subresource);
        assert!(!is_cacheable(&post, &ok));

        let ext = ProxyRequest::get(url("chrome-extension://abc/script.js"));
        assert!(!is_cacheable(&ext, &ok));
    }

    #[tokio::test]
    async fn install_then_activate_reaches_active() {
        let network = FakeNetwork::default()
            .with("http://app.local/", ProxyResponse::new(200, "root"))
            .with("http://app.local/index.html", ProxyResponse::new(200, "shell"));
        let proxy = CacheProxy::new(config(&["/", "/index.html"]), MemoryCacheStorage::new(), network);

        assert_eq!(proxy.state(), ProxyState::Parsed);
        assert_eq!(proxy.install().await.unwrap(), 2);
        assert_eq!(proxy.state(), ProxyState::Installed);
        proxy.activate().await.unwrap();
        assert_eq!(proxy.state(), ProxyState::Active);
        assert_eq!(proxy.storage().len("v1").unwrap(), 2);
    }

    #[tokio::test]
    async fn activate_requires_install() {
        let proxy = CacheProxy::new(config(&[]), MemoryCacheStorage::new(), FakeNetwork::default());
        let err = proxy.activate().await.unwrap_err();
        assert!(matches!(
            err,
            CacheError::InvalidState {
                state: ProxyState::Parsed,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn install_rejects_non_200_assets() {
        let network = FakeNetwork::default()
            .with("http://app.local/", ProxyResponse::new(200, "root"))
            .with("http://app.local/manifest.json", ProxyResponse::new(404, "missing"));
        let proxy = CacheProxy::new(
            config(&["/", "/manifest.json"]),
            MemoryCacheStorage::new(),
            network,
        );

        let err = proxy.install().await.unwrap_err();
        assert!(matches!(err, CacheError::InstallFailed { ref failures, total: 2, .. } if failures.len() == 1));
        assert_eq!(proxy.state(), ProxyState::Redundant);
        assert!(proxy.storage().namespaces().unwrap().is_empty());
    }

    #[tokio::test]
    async fn install_accepts_any_2xx_asset() {
        let network = FakeNetwork::default()
            .with("http://app.local/", ProxyResponse::new(200, "root"))
            .with("http://app.local/ping", ProxyResponse::new(204, ""))
            .with("http://app.local/mirror.css", ProxyResponse::new(203, "css"));
        let proxy = CacheProxy::new(
            config(&["/", "/ping", "/mirror.css"]),
            MemoryCacheStorage::new(),
            network,
        );

        assert_eq!(proxy.install().await.unwrap(), 3);
        assert_eq!(proxy.state(), ProxyState::Installed);
        assert_eq!(proxy.storage().len("v1").unwrap(), 3);
    }

    #[tokio::test]
    async fn inactive_proxy_passes_through_without_caching() {
        let network = FakeNetwork::default().with("http://app.local/a.js", ProxyResponse::new(200, "js"));
        let proxy = CacheProxy::new(config(&[]), MemoryCacheStorage::new(), network);

        let resp = proxy.handle(ProxyRequest::get(url("http://app.local/a.js"))).await.unwrap();
        assert_eq!(resp.body, b"js");
        assert!(proxy.storage().namespaces().unwrap().is_empty());
    }

    #[tokio::test]
    async fn sync_handles_only_the_notes_tag() {
        let proxy = CacheProxy::new(config(&[]), MemoryCacheStorage::new(), FakeNetwork::default());
        assert_eq!(proxy.sync(SYNC_NOTES_TAG).await, SyncOutcome::Handled);
        assert_eq!(proxy.sync("sync-photos").await, SyncOutcome::Ignored);
        assert_eq!(proxy.network.calls.load(Ordering::SeqCst), 0);
    }
}
