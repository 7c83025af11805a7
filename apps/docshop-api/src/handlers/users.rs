//! Registration, login and logout

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::Response,
    Form,
};
use serde::{Deserialize, Serialize};

use super::flash_failure;
use crate::flash::{see_other, Flash, FlashMessage};
use crate::services::auth;
use crate::session::{
    append_cookie, expired_cookie, read_cookie, session_cookie, LOGIN_PATH, SESSION_COOKIE,
};
use crate::state::AppState;

pub const REGISTER_PATH: &str = "/users/register/";

/// Local path to continue to after login; anything else falls back to `/`
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path
        }
        _ => "/",
    }
}

#[derive(Debug, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginPage {
    pub next: String,
    pub messages: Vec<FlashMessage>,
}

#[derive(Debug, Serialize)]
pub struct RegisterPage {
    pub messages: Vec<FlashMessage>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub password1: String,
    pub password2: String,
}

/// GET /users/login/
pub async fn login_page(flash: Flash, Query(query): Query<NextQuery>) -> Response {
    let next = safe_next(query.next.as_deref()).to_string();
    flash.render(|messages| LoginPage { next, messages })
}

/// POST /users/login/
pub async fn login(
    State(state): State<Arc<AppState>>,
    flash: Flash,
    Form(form): Form<LoginForm>,
) -> Response {
    let next = safe_next(form.next.as_deref()).to_string();

    match auth::login(
        &state.db,
        &state.config.secret_key,
        &form.username,
        &form.password,
    )
    .await
    {
        Ok((_user, token)) => {
            let mut response = see_other(&next);
            append_cookie(
                &mut response,
                &session_cookie(&token, state.config.secure_cookies),
            );
            response
        }
        Err(e) => {
            let back = format!("{}?next={}", LOGIN_PATH, urlencoding::encode(&next));
            flash_failure(flash, &back, "login", e)
        }
    }
}

/// GET /users/register/
pub async fn register_page(flash: Flash) -> Response {
    flash.render(|messages| RegisterPage { messages })
}

/// POST /users/register/
pub async fn register(
    State(state): State<Arc<AppState>>,
    flash: Flash,
    Form(form): Form<RegisterForm>,
) -> Response {
    match auth::register(&state.db, &form.username, &form.password1, &form.password2).await {
        Ok(user) => {
            tracing::info!(user_id = user.id, "Registered new user");
            flash.success(
                LOGIN_PATH,
                "Registration successful! You can now log in.",
            )
        }
        Err(e) => flash_failure(flash, REGISTER_PATH, "register", e),
    }
}

/// POST /users/logout/
pub async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Some(token) = read_cookie(&headers, SESSION_COOKIE) {
        if let Err(e) = auth::logout(&state.db, &state.config.secret_key, &token).await {
            e.log("logout");
        }
    }

    let mut response = see_other("/");
    append_cookie(
        &mut response,
        &expired_cookie(SESSION_COOKIE, state.config.secure_cookies),
    );
    response
}
