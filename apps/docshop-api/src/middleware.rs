//! Host header validation

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::HOST, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::state::AppState;

/// Host name without port, lowercased
fn host_name(raw: &str) -> String {
    let raw = raw.trim();
    let host = if raw.starts_with('[') {
        // [::1]:3001
        raw.split_once(']')
            .map(|(h, _)| format!("{}]", h))
            .unwrap_or_else(|| raw.to_string())
    } else {
        raw.rsplit_once(':')
            .map(|(h, _)| h.to_string())
            .unwrap_or_else(|| raw.to_string())
    };
    host.to_lowercase()
}

/// `*` allows anything; `.example.com` allows the domain and its subdomains
pub fn host_allowed(host: &str, allowed: &[String]) -> bool {
    let host = host_name(host);
    if host.is_empty() {
        return false;
    }
    allowed.iter().any(|pattern| {
        if pattern == "*" {
            true
        } else if let Some(domain) = pattern.strip_prefix('.') {
            host == domain || host.ends_with(pattern.as_str())
        } else {
            host == *pattern
        }
    })
}

pub async fn require_allowed_host(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let host = request
        .headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| request.uri().authority().map(|a| a.to_string()));

    match host {
        Some(host) if host_allowed(&host, &state.config.allowed_hosts) => next.run(request).await,
        other => {
            tracing::warn!(host = ?other, "Rejected request with disallowed Host header");
            (StatusCode::BAD_REQUEST, "Bad Request (400)").into_response()
        }
    }
}
