//! Request and response values flowing through the proxy.

use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};

/// How the client issued a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// Top-level page load. Eligible for the shell fallback.
    Navigate,
    /// Anything else: scripts, styles, fonts, API calls.
    Subresource,
}

/// An intercepted outbound request.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    pub url: Url,
    pub mode: RequestMode,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ProxyRequest {
    pub fn new(method: Method, url: Url, mode: RequestMode) -> Self {
        Self {
            method,
            url,
            mode,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// A plain GET for a subresource.
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url, RequestMode::Subresource)
    }

    /// A GET page load.
    pub fn navigate(url: Url) -> Self {
        Self::new(Method::GET, url, RequestMode::Navigate)
    }

    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    /// Identity used for cache lookups: method plus absolute URL.
    pub fn cache_key(&self) -> CacheKey {
        CacheKey {
            method: self.method.as_str().to_string(),
            url: self.url.as_str().to_string(),
        }
    }
}

/// Exact-match key of a cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub method: String,
    pub url: String,
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// A response as returned to the client and as stored in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ProxyResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Any 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_distinguishes_method() {
        let url = Url::parse("http://localhost/app.css").unwrap();
        let get = ProxyRequest::get(url.clone());
        let head = ProxyRequest::new(Method::HEAD, url, RequestMode::Subresource);
        assert_ne!(get.cache_key(), head.cache_key());
        assert_eq!(get.cache_key().to_string(), "GET http://localhost/app.css");
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let resp = ProxyResponse::new(200, "x").with_header("Content-Type", "text/css");
        assert_eq!(resp.header("content-type"), Some("text/css"));
        assert_eq!(resp.header("etag"), None);
    }

    #[test]
    fn success_covers_every_2xx() {
        for status in [200, 203, 204, 299] {
            assert!(ProxyResponse::new(status, "").is_success(), "{status}");
        }
        for status in [199, 301, 404, 500] {
            assert!(!ProxyResponse::new(status, "").is_success(), "{status}");
        }
    }
}
