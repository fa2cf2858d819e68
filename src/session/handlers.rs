use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::http::response::json_error;
use crate::http::server::AppState;

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// `GET /session`: the current user for the bearer token.
pub async fn current_session(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match bearer_token(&headers).and_then(|t| state.sessions.get(t)) {
        Some(session) => Json(session.user).into_response(),
        None => json_error(StatusCode::UNAUTHORIZED, "Not authenticated"),
    }
}

/// `POST /session/logout`: idempotent.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> StatusCode {
    if let Some(session) = bearer_token(&headers).and_then(|t| state.sessions.logout(t)) {
        tracing::debug!(user_id = %session.user.id, "Session ended");
    }
    StatusCode::NO_CONTENT
}
