//! Session capture from relayed auth responses.
//!
//! The backend answers `auth/login` and `auth/register` with
//! `{"user": {...}, "token": "..."}`. The relay is not altered; the gateway
//! only observes the body it already buffered.

use axum::http::{header, HeaderMap, StatusCode};
use serde::Deserialize;

use crate::session::store::User;

const AUTH_PATHS: &[&str] = &["auth/login", "auth/register"];

#[derive(Deserialize)]
struct AuthPayload {
    user: User,
    token: Option<String>,
}

/// The `(token, user)` pair carried by a successful auth response, if any.
pub fn auth_session(
    path: &str,
    status: StatusCode,
    headers: &HeaderMap,
    body: &[u8],
) -> Option<(String, User)> {
    let path = path.trim_matches('/');
    if !status.is_success() || !AUTH_PATHS.contains(&path) {
        return None;
    }

    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));
    if !is_json {
        return None;
    }

    let payload: AuthPayload = serde_json::from_slice(body).ok()?;
    let token = payload.token.filter(|t| !t.is_empty())?;
    Some((token, payload.user))
}
