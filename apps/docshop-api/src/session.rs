//! Cookie sessions and the authenticated-user extractor

use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{
        header::{COOKIE, LOCATION, SET_COOKIE},
        request::Parts,
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
};
use chrono::Duration;
use shared_types::User;

use crate::services::auth;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "sessionid";
pub const LOGIN_PATH: &str = "/users/login/";

/// Two weeks
pub fn session_ttl() -> Duration {
    Duration::days(14)
}

/// Value of cookie `name` from the request's `Cookie` headers
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

/// `Set-Cookie` value; `max_age` of `None` makes a browser-session cookie
pub fn cookie(name: &str, value: &str, max_age: Option<i64>, secure: bool) -> String {
    let mut cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", name, value);
    if let Some(max_age) = max_age {
        cookie.push_str(&format!("; Max-Age={}", max_age));
    }
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn expired_cookie(name: &str, secure: bool) -> String {
    cookie(name, "", Some(0), secure)
}

pub fn session_cookie(token: &str, secure: bool) -> String {
    cookie(
        SESSION_COOKIE,
        token,
        Some(session_ttl().num_seconds()),
        secure,
    )
}

/// Add a `Set-Cookie` header without replacing ones already present
pub fn append_cookie(response: &mut Response, cookie: &str) {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().append(SET_COOKIE, value);
        }
        Err(e) => tracing::warn!("Dropping unencodable cookie: {}", e),
    }
}

/// Redirect to the login page, remembering where the user was going
pub fn login_redirect(next: &str) -> Response {
    let location = format!("{}?next={}", LOGIN_PATH, urlencoding::encode(next));
    let mut response = StatusCode::FOUND.into_response();
    if let Ok(value) = HeaderValue::from_str(&location) {
        response.headers_mut().insert(LOCATION, value);
    }
    response
}

/// The logged-in user; requests without a valid session are sent to login
pub struct CurrentUser(pub User);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let next = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());

        let Some(token) = read_cookie(&parts.headers, SESSION_COOKIE) else {
            return Err(login_redirect(&next));
        };

        match auth::user_for_session(&state.db, &token, &state.config.secret_key).await {
            Ok(Some(user)) => Ok(CurrentUser(user)),
            Ok(None) => Err(login_redirect(&next)),
            Err(e) => {
                e.log("session lookup");
                Err(login_redirect(&next))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_cookie_across_headers() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("a=1; sessionid=abc"));
        headers.append(COOKIE, HeaderValue::from_static("messages=xyz"));

        assert_eq!(read_cookie(&headers, SESSION_COOKIE), Some("abc".to_string()));
        assert_eq!(read_cookie(&headers, "messages"), Some("xyz".to_string()));
        assert_eq!(read_cookie(&headers, "missing"), None);
    }

    #[test]
    fn test_cookie_attributes() {
        let c = session_cookie("tok", true);
        assert!(c.starts_with("sessionid=tok; Path=/; HttpOnly; SameSite=Lax"));
        assert!(c.contains("Max-Age=1209600"));
        assert!(c.ends_with("; Secure"));

        assert_eq!(
            expired_cookie("messages", false),
            "messages=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"
        );
    }

    #[test]
    fn test_login_redirect_keeps_next() {
        let resp = login_redirect("/cart/?x=1");
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(
            resp.headers().get(LOCATION).unwrap(),
            "/users/login/?next=%2Fcart%2F%3Fx%3D1"
        );
    }
}
