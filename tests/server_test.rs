mod helpers;

use axum::routing::{get, MethodRouter};
use axum::Router;
use dayjot::cache::{CacheProxy, CacheStorage, HttpNetwork, MemoryCacheStorage, Network, ProxyConfig};
use reqwest::{StatusCode, Url};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Serve `proxy` on an ephemeral port for the rest of the test.
async fn spawn_proxy<S, N>(proxy: CacheProxy<S, N>) -> SocketAddr
where
    S: CacheStorage + 'static,
    N: Network + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(dayjot::server::run(listener, proxy, std::future::pending()));
    addr
}

/// Static upstream route that counts its hits.
fn counted(body: &'static str, hits: Arc<AtomicUsize>) -> MethodRouter {
    get(move || {
        let hits = Arc::clone(&hits);
        async move {
            hits.fetch_add(1, Ordering::SeqCst);
            body
        }
    })
}

fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

#[tokio::test]
async fn navigation_over_http_gets_shell_when_offline() {
    let proxy = helpers::active_proxy(helpers::manifest_network()).await;
    proxy.network().go_offline();
    let addr = spawn_proxy(proxy).await;

    let response = client()
        .get(format!("http://{addr}/notes/42"))
        .header("accept", "text/html")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "<html>shell</html>");

    let response = client()
        .get(format!("http://{addr}/notes/42.json"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn sync_route_accepts_only_known_tags() {
    let proxy = helpers::active_proxy(helpers::manifest_network()).await;
    let addr = spawn_proxy(proxy).await;

    let ok = client()
        .post(format!("http://{addr}/__sync/sync-notes"))
        .send()
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::ACCEPTED);

    let unknown = client()
        .post(format!("http://{addr}/__sync/sync-photos"))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn real_upstream_is_hit_once_per_asset() {
    let hits = Arc::new(AtomicUsize::new(0));
    let upstream = Router::new()
        .route("/", counted("root", Arc::clone(&hits)))
        .route("/index.html", counted("shell", Arc::clone(&hits)))
        .route("/manifest.json", counted("{}", Arc::clone(&hits)))
        .route("/app.css", counted("body{}", Arc::clone(&hits)));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let upstream_addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, upstream).await });

    let config = ProxyConfig {
        origin: Url::parse(&format!("http://{upstream_addr}")).unwrap(),
        ..helpers::proxy_config("v1")
    };
    let network = HttpNetwork::new(client());
    let proxy = CacheProxy::new(config, MemoryCacheStorage::new(), network);
    dayjot::server::start(&proxy).await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 3);

    let addr = spawn_proxy(proxy).await;
    for _ in 0..2 {
        let body = client()
            .get(format!("http://{addr}/manifest.json"))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "{}");
    }
    assert_eq!(hits.load(Ordering::SeqCst), 3);

    for _ in 0..2 {
        let body = client()
            .get(format!("http://{addr}/app.css"))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "body{}");
    }
    assert_eq!(hits.load(Ordering::SeqCst), 4);
}
