//! Path-preserving request forwarding to the backend origin.

use std::time::Duration;

use axum::{
    body::Body,
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use thiserror::Error;
use url::Url;

use crate::http::response::json_error;
use crate::proxy::headers::outbound_headers;

/// A forwarding failure. Every variant is a 502 to the caller.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("invalid target URL {target:?}: {source}")]
    InvalidTarget {
        target: String,
        #[source]
        source: url::ParseError,
    },

    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl IntoResponse for ForwardError {
    fn into_response(self) -> Response {
        json_error(StatusCode::BAD_GATEWAY, "Bad gateway")
    }
}

/// The parts of an inbound request the forwarder needs.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    /// Path below the mount point, without a leading slash.
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// An upstream response, relayed as-is.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl IntoResponse for UpstreamResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// `{origin}/{path}[?query]`, with any trailing slash on the origin removed.
pub fn build_target(origin: &Url, path: &str, query: Option<&str>) -> Result<Url, ForwardError> {
    let mut target = format!("{}/{}", origin.as_str().trim_end_matches('/'), path);
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        target.push('?');
        target.push_str(query);
    }
    Url::parse(&target).map_err(|source| ForwardError::InvalidTarget { target, source })
}

/// Relays requests to a backend. Cheap to clone; clones share a connection pool.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: reqwest::Client,
}

impl Forwarder {
    /// A forwarder that never follows redirects; 3xx responses are relayed.
    pub fn new(connect_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .build()?;
        Ok(Self { client })
    }

    /// Forward `inbound` to `origin`. No retries.
    pub async fn forward(
        &self,
        origin: &Url,
        inbound: InboundRequest,
        strip_headers: &[String],
    ) -> Result<UpstreamResponse, ForwardError> {
        let target = build_target(origin, &inbound.path, inbound.query.as_deref())?;
        let headers = outbound_headers(&inbound.headers, &target, strip_headers);

        tracing::debug!(
            method = %inbound.method,
            target = %target,
            "Forwarding to backend"
        );

        let mut request = self
            .client
            .request(inbound.method.clone(), target)
            .headers(headers);
        if inbound.method != Method::GET && inbound.method != Method::HEAD {
            request = request.body(inbound.body);
        }

        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(UpstreamResponse { status, headers, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_origin_and_path() {
        let origin = Url::parse("https://api.example.com").unwrap();
        let target = build_target(&origin, "design/123", None).unwrap();
        assert_eq!(target.as_str(), "https://api.example.com/design/123");
    }

    #[test]
    fn origin_path_and_trailing_slash() {
        let origin = Url::parse("https://api.example.com/v1/").unwrap();
        let target = build_target(&origin, "chat/rooms", Some("page=2")).unwrap();
        assert_eq!(target.as_str(), "https://api.example.com/v1/chat/rooms?page=2");
    }

    #[test]
    fn empty_path_targets_root() {
        let origin = Url::parse("http://localhost:4000").unwrap();
        let target = build_target(&origin, "", Some("")).unwrap();
        assert_eq!(target.as_str(), "http://localhost:4000/");
    }

    #[tokio::test]
    async fn relays_response_verbatim() {
        let mut headers = HeaderMap::new();
        headers.insert("x-upstream", "yes".parse().unwrap());
        let upstream = UpstreamResponse {
            status: StatusCode::CREATED,
            headers,
            body: Bytes::from_static(b"{\"id\":1}"),
        };

        let response = upstream.into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers().len(), 1);
        assert_eq!(response.headers().get("x-upstream").unwrap(), "yes");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"{\"id\":1}");
    }
}
