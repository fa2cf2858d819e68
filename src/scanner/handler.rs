//! Scanner HTTP handlers.

use std::convert::Infallible;
use std::time::Instant;

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
};
use bytes::Bytes;
use futures_util::stream::{self, Stream, StreamExt};
use serde::Deserialize;

use crate::config::resolver::{parse_origin, resolve_default_org};
use crate::http::request::request_id;
use crate::http::response::plain_text;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::scanner::events::{decode_message, ScanMessageError};
use crate::scanner::rewrite::rewrite_scan_page;
use crate::scanner::upstream::{base_href, is_single_segment, scan_page_url};
use crate::scanner::ScannerError;

const ROUTE: &str = "scanner";

#[derive(Debug, Deserialize)]
pub struct ScanPageParams {
    pub token: Option<String>,
    pub org: Option<String>,
}

/// `GET /bodygram-proxy?token=..&org=..`
pub async fn scan_page_handler(
    State(state): State<AppState>,
    Query(params): Query<ScanPageParams>,
    headers: HeaderMap,
) -> Response {
    let start = Instant::now();
    let request_id = request_id(&headers).to_string();

    let result = serve_scan_page(&state, params, &headers).await;
    let response = match result {
        Ok(response) => response,
        Err(e) => {
            match &e {
                ScannerError::MissingParams => {
                    tracing::warn!(request_id = %request_id, "Scan page requested without token or org");
                }
                ScannerError::InvalidOrg(org) => {
                    tracing::warn!(request_id = %request_id, org = %org, "Scan page requested with invalid org");
                }
                ScannerError::Upstream(status) => {
                    tracing::warn!(request_id = %request_id, status = %status, "Scan page upstream refused");
                }
                _ => {
                    metrics::record_upstream_error(ROUTE);
                    tracing::error!(request_id = %request_id, error = %e, "Scan page proxy error");
                }
            }
            e.into_response()
        }
    };

    metrics::record_request(ROUTE, response.status().as_u16(), start);
    response
}

async fn serve_scan_page(
    state: &AppState,
    params: ScanPageParams,
    headers: &HeaderMap,
) -> Result<Response, ScannerError> {
    let config = state.config.load_full();

    let token = params.token.filter(|t| !t.is_empty());
    let org = params
        .org
        .filter(|o| !o.is_empty())
        .or_else(|| resolve_default_org(&config.scanner, state.env.as_ref()));
    let (Some(token), Some(org)) = (token, org) else {
        return Err(ScannerError::MissingParams);
    };
    if !is_single_segment(&org) {
        return Err(ScannerError::InvalidOrg(org));
    }

    let origin = parse_origin(&config.scanner.upstream_origin)?;
    let target = scan_page_url(&origin, &org, &token)?;

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or(&config.scanner.user_agent);

    tracing::debug!(org = %org, "Fetching scan page");
    let html = state.scan_pages.fetch(target, user_agent).await?;
    let body = rewrite_scan_page(&html, &base_href(&origin));

    let mut response = (StatusCode::OK, body).into_response();
    let out = response.headers_mut();
    out.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    out.insert(
        "permissions-policy",
        HeaderValue::from_static("camera=(self), microphone=(self)"),
    );
    out.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    Ok(response)
}

/// Identifies the scan an event stream or relayed message belongs to.
#[derive(Debug, Deserialize)]
pub struct ScanEventParams {
    pub token: Option<String>,
}

impl ScanEventParams {
    fn token(self) -> Option<String> {
        self.token.filter(|t| !t.is_empty())
    }
}

/// `POST /scanner/events?token=..`: relay of a scan page `postMessage`.
pub async fn relay_scan_message(
    State(state): State<AppState>,
    Query(params): Query<ScanEventParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(token) = params.token() else {
        return plain_text(StatusCode::BAD_REQUEST, "Missing token parameter");
    };
    let config = state.config.load_full();
    let origin = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok());

    match decode_message(origin, &config.scanner.allowed_origins, &body) {
        Ok(Some(event)) => {
            let delivered = state.scan_events.publish(&token, event.clone());
            tracing::info!(event = event.name(), delivered, "Scan event published");
            StatusCode::ACCEPTED.into_response()
        }
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(ScanMessageError::UntrustedOrigin(origin)) => {
            tracing::warn!(origin = %origin, "Rejected scan message from untrusted origin");
            plain_text(StatusCode::FORBIDDEN, "Untrusted origin")
        }
        Err(e @ ScanMessageError::Malformed(_)) => {
            tracing::debug!(error = %e, "Malformed scan message");
            plain_text(StatusCode::BAD_REQUEST, "Malformed scan message")
        }
    }
}

/// `GET /scanner/events?token=..`: server-sent events of one scan.
///
/// The stream ends when the server starts draining.
pub async fn scan_event_stream(
    State(state): State<AppState>,
    Query(params): Query<ScanEventParams>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, Response> {
    let Some(token) = params.token() else {
        return Err(plain_text(StatusCode::BAD_REQUEST, "Missing token parameter"));
    };

    let subscription = state.scan_events.subscribe(&token);
    let events = stream::unfold(subscription, |mut subscription| async move {
        let event = subscription.next().await?;
        let data = serde_json::to_string(&event).unwrap_or_default();
        Some((Ok(Event::default().event(event.name()).data(data)), subscription))
    })
    .take_until(state.drain.subscribe().wait());

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
