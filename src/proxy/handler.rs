//! `ANY /proxy/{*path}`.

use std::time::Instant;

use axum::{
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use bytes::Bytes;

use crate::config::resolver::resolve_backend_origin;
use crate::http::request::request_id;
use crate::http::response::json_error;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::proxy::forwarder::InboundRequest;
use crate::session::capture::auth_session;

pub const MOUNT: &str = "/proxy";
const ROUTE: &str = "proxy";

/// The path below the mount point, without a leading slash.
pub fn proxied_path(path: &str) -> &str {
    path.strip_prefix(MOUNT)
        .unwrap_or(path)
        .trim_start_matches('/')
}

pub async fn forward_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let start = Instant::now();
    let request_id = request_id(&headers).to_string();
    let config = state.config.load_full();

    let origin = match resolve_backend_origin(&config.backend, state.env.as_ref()) {
        Ok(origin) => origin,
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Backend origin unavailable");
            metrics::record_request(ROUTE, 500, start);
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Backend URL not configured on server.",
            );
        }
    };

    let path = proxied_path(uri.path()).to_string();
    let inbound = InboundRequest {
        method,
        path,
        query: uri.query().map(str::to_string),
        headers,
        body,
    };
    let path = inbound.path.clone();

    match state
        .forwarder
        .forward(&origin, inbound, &config.backend.strip_request_headers)
        .await
    {
        Ok(upstream) => {
            tracing::debug!(
                request_id = %request_id,
                path = %path,
                status = %upstream.status,
                "Upstream responded"
            );

            if config.session.capture_auth {
                if let Some((token, user)) =
                    auth_session(&path, upstream.status, &upstream.headers, &upstream.body)
                {
                    state.sessions.login(token, user);
                }
            }

            metrics::record_request(ROUTE, upstream.status.as_u16(), start);
            upstream.into_response()
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, path = %path, error = %e, "Proxy error");
            metrics::record_upstream_error(ROUTE);
            metrics::record_request(ROUTE, 502, start);
            e.into_response()
        }
    }
}
