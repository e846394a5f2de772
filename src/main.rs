//! Host-rewriting reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                              ┌──────────────────────────────────────────────────────┐
//!                              │                  REWRITE PROXY                        │
//!                              │                                                       │
//!     Client Request           │  ┌─────────┐    ┌───────────┐    ┌──────────────┐    │
//!     ─────────────────────────┼─▶│  http   │───▶│ admission │───▶│   rewrite    │    │
//!                              │  │ server  │    │  rules    │    │ headers (out)│    │
//!                              │  └─────────┘    └─────┬─────┘    └──────┬───────┘    │
//!                              │                       │ deny            │            │
//!                              │                       ▼                 ▼            │
//!                              │               decoy / 302        ┌──────────────┐    │
//!                              │                                  │   upstream   │────┼──▶ Backend
//!                              │                                  │ single fetch │◀───┼───
//!     Client Response          │  ┌─────────┐    ┌───────────┐    └──────┬───────┘    │
//!     ◀────────────────────────┼──│response │◀───│  rewrite  │◀──────────┘            │
//!                              │  │         │    │ headers+  │                        │
//!                              │  └─────────┘    │ text body │                        │
//!                              │                 └───────────┘                        │
//!                              │  config (TOML + env, hot reload) · observability     │
//!                              │  lifecycle (signals, graceful shutdown)              │
//!                              └──────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use rewrite_proxy::config::{resolve_config, watcher::ConfigWatcher};
use rewrite_proxy::lifecycle::{signals, Shutdown};
use rewrite_proxy::observability::{logging, metrics};
use rewrite_proxy::HttpServer;

#[derive(Parser)]
#[command(name = "rewrite-proxy")]
#[command(about = "Reverse proxy that rewrites backend host:port tokens to the public origin", long_about = None)]
struct Args {
    /// TOML configuration file. Environment variables override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reload the configuration file when it changes.
    #[arg(long, requires = "config")]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = resolve_config(args.config.as_deref())?;

    logging::init_logging(&config.observability);
    tracing::info!("rewrite-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    match &config.route.proxy_host {
        Some(host) => tracing::info!(
            bind_address = %config.listener.bind_address,
            backend = %format!("{}://{}:{}", config.route.proxy_protocol, host, config.route.proxy_port),
            debug = config.route.debug,
            "Configuration loaded"
        ),
        None => tracing::warn!(
            bind_address = %config.listener.bind_address,
            "No backend host configured, every request will be denied"
        ),
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    // The watcher must outlive the server for reloads to arrive.
    let (_watcher, config_updates) = match args.config.as_deref() {
        Some(path) if args.watch => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        _ => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        signals::wait_for_termination().await;
        shutdown.trigger();
    });

    let server = HttpServer::new(config)?;
    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
