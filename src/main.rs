//! Tailor Gateway
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!                        │                 TAILOR GATEWAY               │
//!   Browser              │                                              │
//!   ─────────────────────┼─▶ /proxy/{*path} ──▶ resolve origin ─────────┼──▶ Backend API
//!                        │                      (env, per request)      │
//!                        │                                              │
//!   ─────────────────────┼─▶ /bodygram-proxy ─▶ fetch + rewrite HTML ───┼──▶ Scanner vendor
//!                        │                                              │
//!   ─────────────────────┼─▶ /scanner/events ─▶ per-scan channel (SSE)  │
//!   ─────────────────────┼─▶ /session ────────▶ session store           │
//!                        │                                              │
//!                        │  config (TOML + env, hot reload) · tracing   │
//!                        │  metrics · admin API · graceful shutdown     │
//!                        └──────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use tailor_gateway::config::loader::load_or_default;
use tailor_gateway::config::watcher::ConfigWatcher;
use tailor_gateway::config::ProcessEnv;
use tailor_gateway::http::server::serve_until;
use tailor_gateway::net::tls::load_tls_config;
use tailor_gateway::observability::{logging, metrics};
use tailor_gateway::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "tailor-gateway", version, about = "Edge gateway for the tailor marketplace")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_or_default(args.config.as_deref(), &ProcessEnv)?;
    logging::init_logging(&config.observability);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "tailor-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        tls = config.listener.tls.is_some(),
        request_timeout_secs = config.timeouts.request_secs,
        scanner_origin = %config.scanner.upstream_origin,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr);
    }

    // Keep the watcher alive for the lifetime of the process.
    let (_watcher, config_updates) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        None => (None, mpsc::unbounded_channel().1),
    };

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    let server = HttpServer::with_env(config.clone(), Arc::new(ProcessEnv))?;
    let sessions = server.state().sessions.clone();

    if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %listener.local_addr()?, "Admin API listening");
        let router = server.admin_router();
        let admin_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            if let Err(e) = serve_until(listener, router, admin_shutdown).await {
                tracing::error!(error = %e, "Admin API failed");
            }
        });
    }

    match &config.listener.tls {
        Some(tls) => {
            let addr: SocketAddr = config.listener.bind_address.parse()?;
            let tls = load_tls_config(tls).await?;
            server
                .run_tls(addr, tls, config_updates, shutdown.subscribe())
                .await?;
        }
        None => {
            let listener = TcpListener::bind(&config.listener.bind_address).await?;
            tracing::info!(address = %listener.local_addr()?, "Listening for connections");
            server
                .run(listener, config_updates, shutdown.subscribe())
                .await?;
        }
    }

    if let Err(e) = sessions.persist() {
        tracing::error!(error = %e, "Failed to persist sessions");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
