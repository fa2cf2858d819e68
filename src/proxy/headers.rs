//! Header manipulation for forwarded requests.
//!
//! # Responsibilities
//! - Copy string-valued inbound headers
//! - Strip hop-by-hop headers and framing the client recomputes
//! - Rewrite `host` to the upstream authority
//!
//! # Design Decisions
//! - Everything else is forwarded, including cookies and authorization;
//!   deployments can drop names via `backend.strip_request_headers`
//! - Response headers are never touched (identity relay)

use axum::http::{header, HeaderMap, HeaderValue};
use url::Url;

/// Headers that describe a single connection and are never forwarded.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "te",
    "trailer",
    "upgrade",
];

/// The `host` value for `target`: hostname plus any non-default port.
pub fn upstream_host(target: &Url) -> Option<String> {
    let host = target.host_str()?;
    Some(match target.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Build the outbound header set for a request to `target`.
pub fn outbound_headers(inbound: &HeaderMap, target: &Url, strip: &[String]) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(inbound.len());

    for (name, value) in inbound {
        let name_str = name.as_str();
        if HOP_BY_HOP.contains(&name_str)
            || name == header::CONTENT_LENGTH
            || name == header::HOST
            || strip.iter().any(|s| s.eq_ignore_ascii_case(name_str))
        {
            continue;
        }
        if value.to_str().is_err() {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    if let Some(host) = upstream_host(target).and_then(|h| HeaderValue::from_str(&h).ok()) {
        headers.insert(header::HOST, host);
    }

    headers
}
