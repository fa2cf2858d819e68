//! Body-scanner integration.
//!
//! # Data Flow
//! ```text
//! GET /bodygram-proxy?token&org
//!     → handler.rs (validate; org falls back to env/config default)
//!     → upstream.rs (vendor URL, browser-like GET)
//!     → rewrite.rs (strip CSP meta, inject <base href>)
//!     → 200 text/html with camera/microphone permissions
//!
//! POST /scanner/events?token (relayed postMessage)
//!     → events.rs (origin check, typed decode) → channel of that token
//! GET /scanner/events?token
//!     → SSE stream of that token's ScanEvents, closed on drain
//! ```

pub mod events;
pub mod handler;
pub mod rewrite;
pub mod upstream;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::config::ResolveError;
use crate::http::response::plain_text;

pub use events::{ScanEvent, ScanEventHub, ScanSubscription};
pub use upstream::ScanPageClient;

#[derive(Debug, Error)]
pub enum ScannerError {
    #[error("missing token or org")]
    MissingParams,

    #[error("org {0:?} is not a single path segment")]
    InvalidOrg(String),

    #[error("upstream returned {0}")]
    Upstream(StatusCode),

    #[error("invalid scanner origin: {0}")]
    Origin(#[from] ResolveError),

    #[error("invalid scan page URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("scan page fetch failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl IntoResponse for ScannerError {
    fn into_response(self) -> Response {
        match self {
            ScannerError::MissingParams => {
                plain_text(StatusCode::BAD_REQUEST, "Missing token or org parameter")
            }
            ScannerError::InvalidOrg(_) => {
                plain_text(StatusCode::BAD_REQUEST, "Invalid org parameter")
            }
            ScannerError::Upstream(status) => {
                plain_text(status, format!("Upstream fetch failed: {}", status.as_u16()))
            }
            ScannerError::Origin(_) | ScannerError::Url(_) | ScannerError::Transport(_) => {
                plain_text(StatusCode::INTERNAL_SERVER_ERROR, "Proxy error")
            }
        }
    }
}
