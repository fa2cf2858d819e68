//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Backend origin resolution for the generic forwarder.
    pub backend: BackendConfig,

    /// Body-scanner page proxy settings.
    pub scanner: ScannerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub security: SecurityConfig,

    pub admin: AdminConfig,

    pub session: SessionConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration. Browsers only grant camera access to the
    /// scanner page over HTTPS.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Where the backend origin comes from.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Environment variables consulted in order, at request time.
    pub origin_env: Vec<String>,

    /// Static origin used when none of `origin_env` is set.
    pub origin: Option<String>,

    /// Inbound headers never forwarded upstream (case-insensitive).
    pub strip_request_headers: Vec<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            origin_env: vec!["VITE_BACKEND_URL".to_string(), "BACKEND_URL".to_string()],
            origin: None,
            strip_request_headers: Vec::new(),
        }
    }
}

/// Body-scanner page proxy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Origin of the vendor scan page; also the injected `<base href>`.
    pub upstream_origin: String,

    /// Environment variables holding the default organization id.
    pub default_org_env: Vec<String>,

    /// Static default organization id.
    pub default_org: Option<String>,

    /// User-Agent sent upstream when the caller did not send one.
    pub user_agent: String,

    /// Origins allowed to post scan messages to `/scanner/events`.
    pub allowed_origins: Vec<String>,

    /// Capacity of the scan event broadcast channel.
    pub event_capacity: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            upstream_origin: "https://platform.bodygram.com".to_string(),
            default_org_env: vec!["VITE_BODYGRAM_ORG_ID".to_string()],
            default_org: None,
            user_agent: "Mozilla/5.0".to_string(),
            allowed_origins: vec!["https://platform.bodygram.com".to_string()],
            event_capacity: 64,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time until response headers) in seconds.
    pub request_secs: u64,

    /// Grace period for draining connections on shutdown, in seconds.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
            shutdown_grace_secs: 10,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "debug".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum forwarded request body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 10 * 1024 * 1024,
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// Session store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Record sessions from successful `auth/login` and `auth/register` relays.
    pub capture_auth: bool,

    /// Session lifetime in seconds.
    pub ttl_secs: u64,

    /// Seconds between sweeps that drop expired sessions.
    pub purge_interval_secs: u64,

    /// JSON snapshot hydrated on start and written on shutdown.
    pub snapshot_path: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            capture_auth: true,
            ttl_secs: 7 * 24 * 3600,
            purge_interval_secs: 300,
            snapshot_path: None,
        }
    }
}
