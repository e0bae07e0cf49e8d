//! Local HTTP listener that runs every request through the cache proxy.
//!
//! Provides [`serve`], which wires the configured asset cache and network into
//! a [`CacheProxy`], brings it to the active state, and serves it with axum.
//! Both origin-form (`GET /app.js`) and absolute-form
//! (`GET http://host/app.js`) requests are accepted.

use anyhow::{Context, Result};
use axum::body::{to_bytes, Body};
use axum::extract::{Path, Request, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use reqwest::Url;
use std::future::Future;

use crate::cache::{
    CacheError, CacheProxy, CacheStorage, HttpNetwork, Network, ProxyConfig, ProxyRequest,
    ProxyResponse, RequestMode, SqliteCacheStorage, SyncOutcome,
};
use crate::config::DayjotConfig;

/// Largest request body forwarded upstream.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

pub type AppProxy = CacheProxy<SqliteCacheStorage, HttpNetwork>;

/// Build the proxy from config: durable asset cache plus a real network client.
pub fn build_proxy(config: &DayjotConfig) -> Result<AppProxy> {
    let proxy_config = ProxyConfig::from_config(&config.cache)?;
    let cache_path = config.resolved_cache_db_path();
    let storage = SqliteCacheStorage::open(&cache_path)?;
    let network = HttpNetwork::new(
        reqwest::Client::builder()
            .build()
            .context("failed to build HTTP client")?,
    );
    Ok(CacheProxy::new(proxy_config, storage, network))
}

/// Bring the proxy to `Active`: resume an installed version or install it now.
pub async fn start<S: CacheStorage, N: Network>(proxy: &CacheProxy<S, N>) -> Result<()> {
    if proxy.resume().await? {
        return Ok(());
    }
    proxy.install().await.context("asset cache install failed")?;
    proxy.activate().await.context("asset cache activation failed")?;
    Ok(())
}

/// Start the proxy listener on the configured address.
pub async fn serve(config: DayjotConfig) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let proxy = build_proxy(&config)?;
    start(&proxy).await?;

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, version = %proxy.config().version, "offline proxy listening");

    run(listener, proxy, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
        tracing::info!("shutting down proxy");
    })
    .await
}

/// Serve `proxy` on an already bound listener until `shutdown` resolves.
pub async fn run<S, N>(
    listener: tokio::net::TcpListener,
    proxy: CacheProxy<S, N>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()>
where
    S: CacheStorage + 'static,
    N: Network + 'static,
{
    axum::serve(listener, router(proxy))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

pub fn router<S, N>(proxy: CacheProxy<S, N>) -> Router
where
    S: CacheStorage + 'static,
    N: Network + 'static,
{
    Router::new()
        .route("/__sync/{tag}", post(sync_handler::<S, N>))
        .fallback(intercept::<S, N>)
        .with_state(proxy)
}

async fn sync_handler<S: CacheStorage, N: Network>(
    State(proxy): State<CacheProxy<S, N>>,
    Path(tag): Path<String>,
) -> StatusCode {
    match proxy.sync(&tag).await {
        SyncOutcome::Handled => StatusCode::ACCEPTED,
        SyncOutcome::Ignored => StatusCode::NOT_FOUND,
    }
}

async fn intercept<S: CacheStorage, N: Network>(
    State(proxy): State<CacheProxy<S, N>>,
    request: Request,
) -> Response {
    let (parts, body) = request.into_parts();

    let url = match request_url(proxy.config(), &parts.uri) {
        Ok(url) => url,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };
    let body = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes.to_vec(),
        Err(e) => return (StatusCode::PAYLOAD_TOO_LARGE, e.to_string()).into_response(),
    };
    let headers = parts
        .headers
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
        .collect();

    let mode = request_mode(&parts.method, &parts.headers);
    let proxy_request = ProxyRequest::new(parts.method, url, mode)
        .with_headers(headers)
        .with_body(body);

    match proxy.handle(proxy_request).await {
        Ok(response) => into_response(response),
        Err(CacheError::Network(e)) => (StatusCode::BAD_GATEWAY, e.to_string()).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "proxy failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Absolute-form URIs are used as-is. Origin-form ones keep the upstream
/// scheme and host and take only the path and query from the request.
fn request_url(config: &ProxyConfig, uri: &axum::http::Uri) -> Result<Url, CacheError> {
    if uri.scheme().is_some() {
        let raw = uri.to_string();
        return Url::parse(&raw).map_err(|e| CacheError::InvalidUrl {
            url: raw,
            reason: e.to_string(),
        });
    }
    let mut url = config.origin.clone();
    url.set_path(uri.path());
    url.set_query(uri.query());
    Ok(url)
}

/// A GET is a navigation when the browser says so, or, for clients that do not
/// send fetch metadata, when it asks for HTML.
fn request_mode(method: &Method, headers: &HeaderMap) -> RequestMode {
    if *method != Method::GET {
        return RequestMode::Subresource;
    }
    let is_navigation = match headers.get("sec-fetch-mode").and_then(|v| v.to_str().ok()) {
        Some(mode) => mode.eq_ignore_ascii_case("navigate"),
        None => headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|accept| accept.contains("text/html")),
    };
    if is_navigation {
        RequestMode::Navigate
    } else {
        RequestMode::Subresource
    }
}

fn into_response(response: ProxyResponse) -> Response {
    let mut builder = Response::builder().status(response.status);
    for (name, value) in &response.headers {
        builder = builder.header(name, value);
    }
    builder.body(Body::from(response.body)).unwrap_or_else(|e| {
        tracing::error!(error = %e, "unrepresentable upstream response");
        StatusCode::BAD_GATEWAY.into_response()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(*v));
        }
        map
    }

    #[test]
    fn fetch_metadata_decides_navigation() {
        let nav = headers(&[("sec-fetch-mode", "navigate"), ("accept", "*/*")]);
        assert_eq!(request_mode(&Method::GET, &nav), RequestMode::Navigate);

        let cors = headers(&[("sec-fetch-mode", "cors"), ("accept", "text/html")]);
        assert_eq!(request_mode(&Method::GET, &cors), RequestMode::Subresource);
    }

    #[test]
    fn accept_header_is_the_fallback_signal() {
        let html = headers(&[("accept", "text/html,application/xhtml+xml")]);
        assert_eq!(request_mode(&Method::GET, &html), RequestMode::Navigate);
        assert_eq!(request_mode(&Method::POST, &html), RequestMode::Subresource);
        assert_eq!(request_mode(&Method::GET, &HeaderMap::new()), RequestMode::Subresource);
    }

    #[test]
    fn origin_form_resolves_against_upstream() {
        let config = ProxyConfig::from_config(&crate::config::CacheConfig {
            upstream: "http://127.0.0.1:5173".into(),
            ..Default::default()
        })
        .unwrap();

        let uri: axum::http::Uri = "/app.js?v=2".parse().unwrap();
        assert_eq!(
            request_url(&config, &uri).unwrap().as_str(),
            "http://127.0.0.1:5173/app.js?v=2"
        );

        let uri: axum::http::Uri = "//evil.example/x".parse().unwrap();
        let url = request_url(&config, &uri).unwrap();
        assert_eq!(url.host_str(), Some("127.0.0.1"));
        assert_eq!(url.port(), Some(5173));

        let uri: axum::http::Uri = "https://cdn.example.com/x.css".parse().unwrap();
        assert_eq!(request_url(&config, &uri).unwrap().as_str(), "https://cdn.example.com/x.css");
    }

    #[test]
    fn response_headers_survive_conversion() {
        let response = into_response(
            ProxyResponse::new(200, "body").with_header("content-type", "text/css"),
        );
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/css");
    }
}
