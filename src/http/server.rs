//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, timeout, request ID, body limit)
//! - Bind server to listener (plain or TLS)
//! - Apply configuration reloads
//! - Sweep expired sessions
//! - Drain in-flight requests on shutdown, ending open event streams

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    extract::DefaultBodyLimit,
    routing::{any, get, post},
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::setup_admin_router;
use crate::config::{EnvSource, GatewayConfig, ProcessEnv};
use crate::http::request::UuidRequestId;
use crate::lifecycle::{Shutdown, ShutdownSignal};
use crate::proxy::handler::forward_handler;
use crate::proxy::Forwarder;
use crate::scanner::handler::{relay_scan_message, scan_event_stream, scan_page_handler};
use crate::scanner::{ScanEventHub, ScanPageClient};
use crate::session::handlers::{current_session, logout};
use crate::session::{SessionError, SessionStore};

/// Errors that prevent the server from being built.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to build upstream HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ArcSwap<GatewayConfig>>,
    pub env: Arc<dyn EnvSource>,
    pub forwarder: Forwarder,
    pub scan_pages: ScanPageClient,
    pub scan_events: ScanEventHub,
    pub sessions: Arc<SessionStore>,
    /// Triggered when the server starts draining; long-lived responses end on it.
    pub drain: Shutdown,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: GatewayConfig, env: Arc<dyn EnvSource>) -> Result<Self, ServerError> {
        let connect_timeout = Duration::from_secs(config.timeouts.connect_secs);
        Ok(Self {
            forwarder: Forwarder::new(connect_timeout)?,
            scan_pages: ScanPageClient::new(connect_timeout)?,
            scan_events: ScanEventHub::new(config.scanner.event_capacity),
            sessions: Arc::new(SessionStore::hydrate(&config.session)?),
            drain: Shutdown::new(),
            config: Arc::new(ArcSwap::from_pointee(config)),
            env,
            started_at: Instant::now(),
        })
    }
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a server that reads the process environment.
    pub fn new(config: GatewayConfig) -> Result<Self, ServerError> {
        Self::with_env(config, Arc::new(ProcessEnv))
    }

    /// Create a server that reads `env` instead of the process environment.
    pub fn with_env(config: GatewayConfig, env: Arc<dyn EnvSource>) -> Result<Self, ServerError> {
        let state = AppState::new(config.clone(), env)?;
        let router = Self::build_router(&config, state.clone());
        Ok(Self { router, state })
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Body limit and timeout are fixed at build time; reloads do not change them.
    /// The request ID is echoed only on gateway-generated responses; relayed
    /// backend responses keep exactly the upstream's headers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let relay = Router::new()
            .route("/proxy", any(forward_handler))
            .route("/proxy/{*path}", any(forward_handler));

        let gateway = Router::new()
            .route("/bodygram-proxy", get(scan_page_handler))
            .route("/api/bodygram-proxy", get(scan_page_handler))
            .route("/scanner/events", get(scan_event_stream).post(relay_scan_message))
            .route("/session", get(current_session))
            .route("/session/logout", post(logout))
            .route("/healthz", get(|| async { "ok" }))
            .layer(PropagateRequestIdLayer::x_request_id());

        relay
            .merge(gateway)
            .layer(DefaultBodyLimit::max(config.security.max_body_size))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
    }

    /// The application router, for embedding or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// The admin router, sharing this server's state.
    pub fn admin_router(&self) -> Router {
        setup_admin_router(self.state.clone())
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Config reloader and session sweeper, aborted when the server stops.
    fn spawn_background(
        &self,
        config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
    ) -> [JoinHandle<()>; 2] {
        let sweep_every =
            Duration::from_secs(self.state.config.load().session.purge_interval_secs.max(1));
        [
            spawn_config_reloader(self.state.config.clone(), config_updates),
            self.state.sessions.clone().spawn_sweeper(sweep_every),
        ]
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        shutdown: ShutdownSignal,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let background = self.spawn_background(config_updates);
        let drain = self.state.drain.clone();

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(async move {
                shutdown.wait().await;
                tracing::info!("Shutdown signal received");
                drain.trigger();
            })
            .await?;

        background.iter().for_each(|task| task.abort());
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server with TLS termination.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        shutdown: ShutdownSignal,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, "HTTPS server starting");

        let grace = Duration::from_secs(self.state.config.load().timeouts.shutdown_grace_secs);
        let background = self.spawn_background(config_updates);
        let drain = self.state.drain.clone();

        let handle = axum_server::Handle::new();
        let signal_handle = handle.clone();
        tokio::spawn(async move {
            shutdown.wait().await;
            tracing::info!("Shutdown signal received");
            drain.trigger();
            signal_handle.graceful_shutdown(Some(grace));
        });

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await?;

        background.iter().for_each(|task| task.abort());
        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}

/// Serve `router` on `listener` until `shutdown` fires. Used for the admin API.
pub async fn serve_until(
    listener: TcpListener,
    router: Router,
    shutdown: ShutdownSignal,
) -> Result<(), std::io::Error> {
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown.wait())
        .await
}

fn spawn_config_reloader(
    config: Arc<ArcSwap<GatewayConfig>>,
    mut updates: mpsc::UnboundedReceiver<GatewayConfig>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(next) = updates.recv().await {
            config.store(Arc::new(next));
            tracing::info!("Configuration snapshot swapped");
        }
    })
}
