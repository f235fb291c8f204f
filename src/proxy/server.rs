//! Accept loop and per-connection handling.
//!
//! # Responsibilities
//! - Bind the configured address and accept connections
//! - Bound concurrent handlers with a semaphore (backpressure)
//! - Run each connection through read → validate → cache/upstream → respond
//! - Stop accepting when [`ProxyHandle::stop`] is called

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Semaphore};
use tracing::{debug, info, info_span, warn, Instrument};
use url::Url;

use crate::cache::Cache;
use crate::config::{ProxyConfig, TargetPolicy};
use crate::error::{ProxyError, Result};
use crate::proxy::{read_request_line, HttpResponse, RequestLine, UpstreamClient};

const INVALID_TARGET: &str = "Access Denied: Invalid target";
const METHOD_NOT_IMPLEMENTED: &str = "This method is not implemented";
const FETCH_FAILED: &str = "Error fetching data from target server";
const PROCESSING_FAILED: &str = "Error processing the request";

/// How long unread request bytes are drained after responding.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Pause after an accept error that is not tied to one connection.
const ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

/// Accept errors that concern a single peer and leave the listener usable.
fn is_connection_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}

// == Target Rule ==
/// Host/port check applied to each absolute target URL.
#[derive(Debug, Clone)]
pub struct TargetRule {
    policy: TargetPolicy,
    host: String,
    port: u16,
}

impl TargetRule {
    /// Builds the rule for `config`, using `bound_port` as the proxy's own port.
    pub fn new(config: &ProxyConfig, bound_port: u16) -> Self {
        let (host, port) = match config.target_policy {
            TargetPolicy::Upstream => (config.upstream_host.clone(), config.upstream_port),
            TargetPolicy::SelfAddressed | TargetPolicy::Any => {
                (config.bind_host.clone(), bound_port)
            }
        };

        Self {
            policy: config.target_policy,
            host,
            port,
        }
    }

    /// Returns true if requests for `url` may be served.
    pub fn admits(&self, url: &Url) -> bool {
        if self.policy == TargetPolicy::Any {
            return true;
        }

        let host_matches = url.host_str().is_some_and(|host| {
            host.trim_start_matches('[')
                .trim_end_matches(']')
                .eq_ignore_ascii_case(&self.host)
        });
        host_matches && url.port_or_known_default() == Some(self.port)
    }
}

// == Request Handler ==
/// Turns one request line into one response.
#[derive(Debug)]
pub struct RequestHandler {
    cache: Cache,
    upstream: Arc<UpstreamClient>,
    scheme: String,
    target: TargetRule,
}

impl RequestHandler {
    pub fn new(cache: Cache, upstream: Arc<UpstreamClient>, scheme: String, target: TargetRule) -> Self {
        Self {
            cache,
            upstream,
            scheme,
            target,
        }
    }

    /// Validates the request and answers it from the cache or the upstream.
    ///
    /// Checks run in order: scheme prefix (403), target host/port (403),
    /// method (501). A fresh cache entry is served without contacting the
    /// upstream; otherwise the upstream body is returned and offered to the
    /// cache, which may refuse it without affecting the response.
    pub async fn respond(&self, line: &str) -> HttpResponse {
        let request = RequestLine::parse(line);

        if !request.target.starts_with(&self.scheme) {
            debug!(target_url = %request.target, "Rejected: scheme not allowed");
            let protocol = self.scheme.trim_end_matches("://").to_uppercase();
            return HttpResponse::error(
                StatusCode::FORBIDDEN,
                &format!("Only {protocol} protocol is allowed"),
            );
        }

        let target = match Url::parse(&request.target) {
            Ok(url) if self.target.admits(&url) => url,
            _ => {
                debug!(target_url = %request.target, "Rejected: invalid target");
                return HttpResponse::error(StatusCode::FORBIDDEN, INVALID_TARGET);
            }
        };

        if !request.is_get() {
            debug!(method = %request.method, "Rejected: method not implemented");
            return HttpResponse::error(StatusCode::NOT_IMPLEMENTED, METHOD_NOT_IMPLEMENTED);
        }

        if let Some(entry) = self.cache.get(&request.target).await {
            debug!(target_url = %request.target, size = entry.size(), "Cache hit");
            return HttpResponse::ok(entry.body().clone(), entry.content_type());
        }

        match self.upstream.fetch(&target).await {
            Ok(fetched) => {
                let cached = self
                    .cache
                    .add(&request.target, fetched.body.clone(), &fetched.content_type)
                    .await;
                info!(
                    target_url = %request.target,
                    size = fetched.body.len(),
                    cached,
                    "Served from upstream"
                );
                HttpResponse::ok(fetched.body, fetched.content_type)
            }
            Err(ProxyError::UpstreamNotFound(url)) => {
                info!(%url, "Resource not found upstream");
                HttpResponse::error(StatusCode::INTERNAL_SERVER_ERROR, FETCH_FAILED)
            }
            Err(err) => {
                warn!(target_url = %request.target, error = %err, "Upstream fetch failed");
                HttpResponse::error(StatusCode::INTERNAL_SERVER_ERROR, PROCESSING_FAILED)
            }
        }
    }

    /// Runs one full request/response cycle on `stream`, then closes it.
    pub async fn serve_connection(&self, stream: TcpStream) {
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let response = match read_request_line(&mut reader).await {
            Ok(Some(line)) => self.respond(&line).await,
            Ok(None) => {
                debug!("Connection closed before a request line was sent");
                return;
            }
            Err(err) => {
                warn!(error = %err, "Failed to read request line");
                HttpResponse::error(StatusCode::INTERNAL_SERVER_ERROR, PROCESSING_FAILED)
            }
        };

        if let Err(err) = response.write_to(&mut write_half).await {
            debug!(error = %err, "Failed to send response");
        }
        let _ = write_half.shutdown().await;

        // Consume leftover request headers so closing does not reset the peer
        let _ = tokio::time::timeout(
            DRAIN_TIMEOUT,
            tokio::io::copy(&mut reader, &mut tokio::io::sink()),
        )
        .await;

        debug!(status = response.status().as_u16(), "Connection closed");
    }

    pub fn upstream(&self) -> &Arc<UpstreamClient> {
        &self.upstream
    }
}

// == Proxy Handle ==
/// Cloneable control handle for a [`ProxyServer`].
#[derive(Debug, Clone)]
pub struct ProxyHandle {
    stop_tx: Arc<watch::Sender<bool>>,
}

impl ProxyHandle {
    /// Asks the accept loop to exit. In-flight connections are not interrupted.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }
}

// == Proxy Server ==
/// A bound proxy listener, ready to accept.
pub struct ProxyServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    handler: Arc<RequestHandler>,
    connection_limit: Arc<Semaphore>,
    handle: ProxyHandle,
    stop_rx: watch::Receiver<bool>,
}

impl ProxyServer {
    /// Binds the configured address and prepares the upstream client.
    pub async fn bind(config: &ProxyConfig, cache: Cache) -> Result<Self> {
        let addr = format!("{}:{}", config.bind_host, config.bind_port);
        let listener = TcpListener::bind((config.bind_host.as_str(), config.bind_port))
            .await
            .map_err(|source| ProxyError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ProxyError::Bind { addr, source })?;

        let upstream = Arc::new(UpstreamClient::new(config)?);
        let target = TargetRule::new(config, local_addr.port());
        let handler = RequestHandler::new(cache, upstream, config.scheme.clone(), target);

        let permits = match config.max_connections {
            0 => Semaphore::MAX_PERMITS,
            limit => limit.min(Semaphore::MAX_PERMITS),
        };
        let (stop_tx, stop_rx) = watch::channel(false);

        info!(
            address = %local_addr,
            upstream = %format!("{}:{}", config.upstream_host, config.upstream_port),
            max_connections = config.max_connections,
            target_policy = %config.target_policy,
            "Proxy listener bound"
        );

        Ok(Self {
            listener,
            local_addr,
            handler: Arc::new(handler),
            connection_limit: Arc::new(Semaphore::new(permits)),
            handle: ProxyHandle {
                stop_tx: Arc::new(stop_tx),
            },
            stop_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn handle(&self) -> ProxyHandle {
        self.handle.clone()
    }

    /// Fetch-count probe and client for the upstream.
    pub fn upstream(&self) -> Arc<UpstreamClient> {
        self.handler.upstream().clone()
    }

    /// Accepts connections until stopped or the listener fails.
    ///
    /// Each connection is served on its own task. A permit from the
    /// connection semaphore is taken before accepting, so at most
    /// `max_connections` handlers run at once.
    pub async fn run(self) -> Result<()> {
        let Self {
            listener,
            local_addr,
            handler,
            connection_limit,
            handle: _handle,
            mut stop_rx,
        } = self;

        info!(address = %local_addr, "Proxy started");

        loop {
            if *stop_rx.borrow_and_update() {
                break;
            }

            let permit = tokio::select! {
                _ = stop_rx.changed() => continue,
                permit = connection_limit.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let accepted = tokio::select! {
                _ = stop_rx.changed() => continue,
                accepted = listener.accept() => accepted,
            };
            let (stream, peer) = match accepted {
                Ok(accepted) => accepted,
                Err(err) if is_connection_error(&err) => {
                    warn!(error = %err, "Connection failed during accept");
                    continue;
                }
                Err(err) => {
                    // Typically fd exhaustion; back off instead of spinning
                    warn!(error = %err, "Accept failed, retrying");
                    tokio::select! {
                        _ = stop_rx.changed() => {}
                        _ = tokio::time::sleep(ACCEPT_BACKOFF) => {}
                    }
                    continue;
                }
            };

            debug!(
                %peer,
                available_permits = connection_limit.available_permits(),
                "Connection accepted"
            );

            let handler = handler.clone();
            tokio::spawn(
                async move {
                    let _permit = permit;
                    handler.serve_connection(stream).await;
                }
                .instrument(info_span!("connection", %peer)),
            );
        }

        info!(address = %local_addr, "Proxy stopped");
        Ok(())
    }
}
