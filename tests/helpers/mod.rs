#![allow(dead_code)]

use async_trait::async_trait;
use dayjot::cache::{
    CacheProxy, MemoryCacheStorage, Network, NetworkError, ProxyConfig, ProxyRequest,
    ProxyResponse,
};
use dayjot::store::{LocalStore, Note};
use reqwest::Url;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// A fresh in-memory journal store.
pub fn test_store() -> LocalStore {
    LocalStore::in_memory()
}

pub fn note(id: &str, created_at: i64) -> Note {
    Note {
        id: id.to_string(),
        title: format!("Title {id}"),
        content: format!("Content {id}"),
        created_at,
        synced: true,
    }
}

/// Scripted network: serves fixed routes until taken offline, and records
/// every URL it was asked for.
#[derive(Default)]
pub struct FakeNetwork {
    routes: HashMap<String, ProxyResponse>,
    offline: AtomicBool,
    calls: AtomicUsize,
    requested: Mutex<Vec<String>>,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, url: &str, status: u16, body: &str) -> Self {
        self.routes
            .insert(url.to_string(), ProxyResponse::new(status, body));
        self
    }

    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl Network for FakeNetwork {
    async fn fetch(&self, request: &ProxyRequest) -> Result<ProxyResponse, NetworkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested
            .lock()
            .unwrap()
            .push(request.url.as_str().to_string());
        if self.offline.load(Ordering::SeqCst) {
            return Err(NetworkError::offline(request.url.as_str()));
        }
        self.routes
            .get(request.url.as_str())
            .cloned()
            .ok_or_else(|| NetworkError::offline(request.url.as_str()))
    }
}

pub const ORIGIN: &str = "http://app.local";
pub const INSIGHT_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/m:generateContent";

pub fn proxy_config(version: &str) -> ProxyConfig {
    ProxyConfig {
        version: version.to_string(),
        origin: Url::parse(ORIGIN).unwrap(),
        manifest: vec!["/".into(), "/index.html".into(), "/manifest.json".into()],
        shell_url: "/index.html".into(),
        bypass_hosts: vec!["generativelanguage.googleapis.com".into()],
    }
}

/// Network serving the whole manifest.
pub fn manifest_network() -> FakeNetwork {
    FakeNetwork::new()
        .route("http://app.local/", 200, "<html>root</html>")
        .route("http://app.local/index.html", 200, "<html>shell</html>")
        .route("http://app.local/manifest.json", 200, "{}")
}

pub fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

/// A proxy over in-memory storage, installed and activated.
pub async fn active_proxy(network: FakeNetwork) -> CacheProxy<MemoryCacheStorage, FakeNetwork> {
    active_proxy_with(MemoryCacheStorage::new(), network).await
}

pub async fn active_proxy_with(
    storage: MemoryCacheStorage,
    network: FakeNetwork,
) -> CacheProxy<MemoryCacheStorage, FakeNetwork> {
    let proxy = CacheProxy::new(proxy_config("v1"), storage, network);
    proxy.install().await.unwrap();
    proxy.activate().await.unwrap();
    proxy
}
