//! Route table

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use shared_types::MAX_UPLOAD_BYTES;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{self, cart, docs, users};
use crate::middleware::require_allowed_host;
use crate::state::AppState;

/// Files accepted in one upload request
pub const MAX_FILES_PER_UPLOAD: usize = 10;

pub fn build_router(state: Arc<AppState>) -> Router {
    // Room for a full batch of maximum-size files plus multipart framing
    let body_limit = MAX_FILES_PER_UPLOAD * MAX_UPLOAD_BYTES as usize + 64 * 1024;

    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // Documents
        .route("/", get(docs::main_page))
        .route("/upload/", get(docs::upload_form).post(docs::upload))
        .route("/analyze/:doc_id/", post(docs::analyze))
        .route("/get_text/:doc_id/", get(docs::get_text))
        .route("/delete/:doc_id/", post(docs::delete))
        // Cart
        .route("/cart/", get(cart::cart_page))
        .route("/cart/:action/", post(cart::cart_action))
        .route("/cart/:action/:doc_id/", post(cart::document_action))
        // Accounts
        .route("/users/login/", get(users::login_page).post(users::login))
        .route("/users/register/", get(users::register_page).post(users::register))
        .route("/users/logout/", post(users::logout))
        // Add middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_allowed_host,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        .with_state(state)
}
