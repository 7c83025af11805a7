//! HTTP handlers
//!
//! Mutations answer with a 303 redirect and a flash message; pages answer
//! with the JSON context a template would have rendered.

pub mod cart;
pub mod docs;
pub mod users;

use axum::{response::Response, Json};

use crate::error::ServiceError;
use crate::flash::Flash;
use crate::models::HealthResponse;

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Log `err` and send the user back to `location` with its message
pub(crate) fn flash_failure(
    flash: Flash,
    location: &str,
    operation: &str,
    err: ServiceError,
) -> Response {
    err.log(operation);
    flash.error(location, err.user_message())
}
