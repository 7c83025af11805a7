//! Error types for the docshop server
//!
//! [`ServiceError`] is what the workflow services return. Page handlers turn
//! it into a flash message plus redirect; JSON handlers turn it into an
//! [`ApiError`] response.

use analysis_client::AnalysisError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use shared_types::UploadError;
use thiserror::Error;

/// Shown for anything the user cannot act on
pub const GENERIC_FAILURE: &str = "An error occurred. Please try again later.";

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    AlreadyInState(String),

    /// The analysis service failed; `message` is what the user sees
    #[error("{message}")]
    Upstream {
        message: String,
        #[source]
        source: AnalysisError,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ServiceError::NotFound(message.into())
    }

    pub fn upstream(message: impl Into<String>, source: AnalysisError) -> Self {
        ServiceError::Upstream {
            message: message.into(),
            source,
        }
    }

    /// Database, filesystem and other failures the user cannot fix
    pub fn is_unexpected(&self) -> bool {
        matches!(
            self,
            ServiceError::Database(_) | ServiceError::Io(_) | ServiceError::Internal(_)
        )
    }

    /// Text safe to show in a flash message or error body
    pub fn user_message(&self) -> String {
        if self.is_unexpected() {
            GENERIC_FAILURE.to_string()
        } else {
            self.to_string()
        }
    }

    /// Log with the amount of detail the kind deserves
    pub fn log(&self, operation: &str) {
        match self {
            ServiceError::Upstream { message, source } => {
                tracing::error!(operation, error = %source, "{}", message);
            }
            e if e.is_unexpected() => {
                tracing::error!(operation, error = ?e, "Unexpected failure");
            }
            e => {
                tracing::info!(operation, reason = %e, "Request rejected");
            }
        }
    }
}

impl From<UploadError> for ServiceError {
    fn from(err: UploadError) -> Self {
        let message = match err {
            UploadError::NoFiles => err.to_string(),
            UploadError::UnsupportedFormat(_) => "Unsupported file format.".to_string(),
            UploadError::TooLarge { .. } => "File is too large.".to_string(),
        };
        ServiceError::Validation(message)
    }
}

/// Error body for JSON endpoints
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Upstream failure: {0}")]
    BadGateway(String),

    #[error("Internal error")]
    Internal,
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(msg) => ApiError::InvalidRequest(msg),
            ServiceError::NotFound(msg) => ApiError::NotFound(msg),
            ServiceError::Forbidden(msg) => ApiError::Forbidden(msg),
            ServiceError::AlreadyInState(msg) => ApiError::Conflict(msg),
            ServiceError::Upstream { message, .. } => ApiError::BadGateway(message),
            ServiceError::Database(_) | ServiceError::Io(_) | ServiceError::Internal(_) => {
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                GENERIC_FAILURE.to_string(),
            ),
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unexpected_errors_hide_detail() {
        let err = ServiceError::Internal(anyhow::anyhow!("disk on fire"));
        assert!(err.is_unexpected());
        assert_eq!(err.user_message(), GENERIC_FAILURE);

        let err = ServiceError::not_found("Document not found.");
        assert!(!err.is_unexpected());
        assert_eq!(err.user_message(), "Document not found.");
    }

    #[test]
    fn test_upstream_shows_operation_message() {
        let err = ServiceError::upstream(
            "Document analysis failed.",
            AnalysisError::Status {
                status: 500,
                message: "boom".into(),
            },
        );
        assert_eq!(err.user_message(), "Document analysis failed.");
    }

    #[test]
    fn test_upload_errors_become_validation() {
        let err: ServiceError = UploadError::TooLarge {
            name: "a.pdf".into(),
            size: 1,
        }
        .into();
        assert!(matches!(err, ServiceError::Validation(ref m) if m == "File is too large."));

        let err: ServiceError = UploadError::NoFiles.into();
        assert_eq!(err.user_message(), "No files were selected.");
    }

    #[test]
    fn test_api_error_status_mapping() {
        let resp = ApiError::from(ServiceError::AlreadyInState("paid".into())).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = ApiError::from(ServiceError::Database(sqlx::Error::RowNotFound)).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
