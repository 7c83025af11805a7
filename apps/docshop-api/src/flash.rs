//! One-shot user messages carried across redirects in a signed cookie

use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header::LOCATION, request::Parts, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::session::{append_cookie, cookie, expired_cookie, read_cookie};
use crate::signing;
use crate::state::AppState;

pub const FLASH_COOKIE: &str = "messages";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub level: Level,
    pub message: String,
}

impl FlashMessage {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: Level::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            message: message.into(),
        }
    }
}

/// Encode messages as a signed cookie value
pub fn encode(messages: &[FlashMessage], secret: &str) -> Result<String, String> {
    let json = serde_json::to_vec(messages).map_err(|e| e.to_string())?;
    signing::sign(&json, secret)
}

/// Messages from a cookie value; forged or garbled values yield nothing
pub fn decode(value: &str, secret: &str) -> Vec<FlashMessage> {
    signing::verify(value, secret)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .unwrap_or_default()
}

/// Messages pending for this request
pub struct Flash {
    pending: Vec<FlashMessage>,
    secret: String,
    secure: bool,
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for Flash {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let pending = read_cookie(&parts.headers, FLASH_COOKIE)
            .map(|value| decode(&value, &state.config.secret_key))
            .unwrap_or_default();

        Ok(Flash {
            pending,
            secret: state.config.secret_key.clone(),
            secure: state.config.secure_cookies,
        })
    }
}

impl Flash {
    /// 303 to `location`, carrying pending messages plus `message`
    pub fn redirect(self, location: &str, message: FlashMessage) -> Response {
        let mut messages = self.pending;
        messages.push(message);

        let mut response = see_other(location);
        match encode(&messages, &self.secret) {
            Ok(value) => append_cookie(&mut response, &cookie(FLASH_COOKIE, &value, None, self.secure)),
            Err(e) => tracing::warn!("Failed to encode flash messages: {}", e),
        }
        response
    }

    pub fn success(self, location: &str, message: impl Into<String>) -> Response {
        self.redirect(location, FlashMessage::success(message))
    }

    pub fn error(self, location: &str, message: impl Into<String>) -> Response {
        self.redirect(location, FlashMessage::error(message))
    }

    /// Render a page that shows the pending messages; `build` receives them
    /// and the cookie is cleared once they are displayed
    pub fn render<T, F>(self, build: F) -> Response
    where
        T: Serialize,
        F: FnOnce(Vec<FlashMessage>) -> T,
    {
        let had_messages = !self.pending.is_empty();
        let mut response = Json(build(self.pending)).into_response();
        if had_messages {
            append_cookie(&mut response, &expired_cookie(FLASH_COOKIE, self.secure));
        }
        response
    }
}

/// Bare 303 redirect
pub fn see_other(location: &str) -> Response {
    let location = HeaderValue::from_str(location).unwrap_or_else(|_| HeaderValue::from_static("/"));
    let mut response = StatusCode::SEE_OTHER.into_response();
    response.headers_mut().insert(LOCATION, location);
    response
}
