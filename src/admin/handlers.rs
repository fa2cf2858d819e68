use axum::{extract::State, Json};
use serde::Serialize;

use crate::config::resolver::resolve_backend_origin;
use crate::config::GatewayConfig;
use crate::http::server::AppState;

const REDACTED: &str = "<redacted>";

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    /// Whether a backend origin currently resolves.
    pub backend_configured: bool,
    pub active_sessions: usize,
    /// Scans with at least one open event stream.
    pub active_scans: usize,
    pub scan_subscribers: usize,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let config = state.config.load_full();
    let backend_configured = resolve_backend_origin(&config.backend, state.env.as_ref()).is_ok();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: if backend_configured { "operational" } else { "degraded" },
        uptime_secs: state.started_at.elapsed().as_secs(),
        backend_configured,
        active_sessions: state.sessions.len(),
        active_scans: state.scan_events.active_scans(),
        scan_subscribers: state.scan_events.subscriber_count(),
    })
}

/// The effective configuration with secrets removed.
pub async fn get_config(State(state): State<AppState>) -> Json<GatewayConfig> {
    let mut config = GatewayConfig::clone(&state.config.load_full());
    if !config.admin.api_key.is_empty() {
        config.admin.api_key = REDACTED.to_string();
    }
    Json(config)
}
