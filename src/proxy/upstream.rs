//! Upstream client for the single fixed backend.

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use tracing::debug;
use url::Url;

use crate::config::ProxyConfig;
use crate::error::{ProxyError, Result};

/// Content type used when the upstream does not send one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// A successfully fetched upstream body.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub body: Bytes,
    pub content_type: String,
}

/// GET client bound to `scheme + upstream_host:upstream_port`.
#[derive(Debug)]
pub struct UpstreamClient {
    client: reqwest::Client,
    base: String,
    fetches: AtomicU64,
}

impl UpstreamClient {
    pub fn new(config: &ProxyConfig) -> Result<Self> {
        // The upstream is addressed directly, never through an environment proxy
        let client = reqwest::Client::builder().no_proxy().build()?;

        let host = if config.upstream_host.contains(':') {
            format!("[{}]", config.upstream_host)
        } else {
            config.upstream_host.clone()
        };

        Ok(Self {
            client,
            base: format!("{}{}:{}", config.scheme, host, config.upstream_port),
            fetches: AtomicU64::new(0),
        })
    }

    /// Upstream URL for `target`: same path and query, fixed host and port.
    ///
    /// The path is taken after URL parsing, so `.` and `..` segments are
    /// already resolved.
    pub fn url_for(&self, target: &Url) -> String {
        match target.query() {
            Some(query) => format!("{}{}?{}", self.base, target.path(), query),
            None => format!("{}{}", self.base, target.path()),
        }
    }

    /// Fetches `target`'s path and query from the upstream.
    ///
    /// A 404 yields [`ProxyError::UpstreamNotFound`]; any other non-success
    /// status yields [`ProxyError::UpstreamStatus`].
    pub async fn fetch(&self, target: &Url) -> Result<Fetched> {
        let url = self.url_for(target);
        self.fetches.fetch_add(1, Ordering::Relaxed);
        debug!(%url, "Fetching from upstream");

        let response = self.client.get(&url).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(ProxyError::UpstreamNotFound(url));
        }
        if !status.is_success() {
            return Err(ProxyError::UpstreamStatus {
                url,
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let body = response.bytes().await?;

        debug!(%url, size = body.len(), %content_type, "Upstream fetch complete");
        Ok(Fetched { body, content_type })
    }

    /// Number of upstream requests issued so far.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }
}
