//! Mini Proxy - A single-target caching HTTP forward proxy
//!
//! Loads the configuration, starts the cache, then hands control to the
//! operator console (or runs headless until a shutdown signal).

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::io::BufReader;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mini_proxy::api::create_router;
use mini_proxy::{AppState, Cache, Config, Console, ProxyServer};

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "mini_proxy", version, about)]
struct Args {
    /// Path to the properties configuration file
    #[arg(short, long, env = "PROXY_CONFIG", default_value = "config.conf")]
    config: PathBuf,

    /// Start the proxy immediately and run without the console until Ctrl+C
    #[arg(long)]
    headless: bool,
}

/// Main entry point for the proxy.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration (any error aborts before binding)
/// 3. Create the cache, which starts its sweep task
/// 4. Start the admin API if `port_admin` is set
/// 5. Run the console, or the proxy headless until a shutdown signal
/// 6. Stop the cache sweep once
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mini_proxy=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    info!("Starting Mini Proxy");

    let config = Config::load(&args.config)
        .with_context(|| format!("loading configuration from {}", args.config.display()))?;
    info!(
        bind = %format!("{}:{}", config.proxy.bind_host, config.proxy.bind_port),
        upstream = %format!("{}:{}", config.proxy.upstream_host, config.proxy.upstream_port),
        ttl_ms = config.cache.ttl.as_millis() as u64,
        max_entries = config.cache.max_entries,
        max_bytes = config.cache.max_bytes,
        "Configuration loaded"
    );

    let cache = Cache::new(&config.cache);
    info!("Cache initialized");

    let admin = match config.admin_port {
        Some(port) => Some(spawn_admin_api(&config.proxy.bind_host, port, cache.clone()).await?),
        None => None,
    };

    let outcome = if args.headless {
        run_headless(&config, cache.clone()).await
    } else {
        let mut console = Console::new(config.proxy.clone(), cache.clone(), tokio::io::stdout());
        console
            .run(BufReader::new(tokio::io::stdin()))
            .await
            .context("console failed")
    };

    if let Some(admin) = admin {
        admin.abort();
    }
    cache.shutdown().await;
    info!("Shutdown complete");

    outcome
}

/// Runs the proxy without the console until Ctrl+C or SIGTERM.
async fn run_headless(config: &Config, cache: Cache) -> anyhow::Result<()> {
    let server = ProxyServer::bind(&config.proxy, cache)
        .await
        .context("starting proxy")?;
    let handle = server.handle();

    let mut task = tokio::spawn(server.run());
    tokio::select! {
        result = &mut task => return result.context("proxy task failed")?.map_err(Into::into),
        _ = shutdown_signal() => handle.stop(),
    }

    task.await.context("proxy task failed")??;
    Ok(())
}

/// Serves the admin API on `host:port` in the background.
async fn spawn_admin_api(host: &str, port: u16, cache: Cache) -> anyhow::Result<JoinHandle<()>> {
    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .with_context(|| format!("binding admin API on {host}:{port}"))?;
    let addr: SocketAddr = listener.local_addr()?;
    info!("Admin API listening on http://{}", addr);

    let app = create_router(AppState::new(cache));
    Ok(tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            error!(error = %err, "Admin API stopped");
        }
    }))
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
