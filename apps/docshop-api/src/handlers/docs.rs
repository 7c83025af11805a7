//! Documents pages and actions

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use shared_types::{ALLOWED_EXTENSIONS, MAX_UPLOAD_BYTES};

use super::flash_failure;
use crate::error::{ApiError, ServiceError};
use crate::flash::Flash;
use crate::models::{MainPageResponse, TextResponse, UploadPageResponse};
use crate::services::docs::{self, UploadedFile};
use crate::session::CurrentUser;
use crate::state::AppState;

/// Multipart field carrying the files
pub const FILES_FIELD: &str = "files";

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

/// GET /
pub async fn main_page(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    flash: Flash,
    Query(query): Query<PageQuery>,
) -> Result<Response, ApiError> {
    let page = docs::list(&state.db, &user, query.page.as_deref())
        .await
        .map_err(|e| {
            e.log("list documents");
            ApiError::from(e)
        })?;

    Ok(flash.render(|messages| MainPageResponse {
        user,
        page,
        messages,
    }))
}

/// GET /upload/
pub async fn upload_form(_user: CurrentUser, flash: Flash) -> Response {
    flash.render(|messages| UploadPageResponse {
        allowed_extensions: ALLOWED_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
        max_upload_bytes: MAX_UPLOAD_BYTES,
        messages,
    })
}

/// Collect the `files` parts; empty parts (no file chosen) are skipped
async fn read_files(multipart: &mut Multipart) -> Result<Vec<UploadedFile>, ServiceError> {
    let mut files = Vec::new();
    loop {
        let field = multipart.next_field().await.map_err(|e| {
            tracing::warn!("Malformed upload: {}", e);
            ServiceError::validation("The upload could not be read.")
        })?;
        let Some(field) = field else {
            break;
        };
        if field.name() != Some(FILES_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(|e| {
            tracing::warn!(file_name = %file_name, "Failed to read upload body: {}", e);
            ServiceError::validation("The upload could not be read.")
        })?;
        if file_name.is_empty() && bytes.is_empty() {
            continue;
        }

        files.push(UploadedFile {
            file_name,
            bytes: bytes.to_vec(),
        });
    }
    Ok(files)
}

/// POST /upload/
pub async fn upload(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    flash: Flash,
    mut multipart: Multipart,
) -> Response {
    let result = match read_files(&mut multipart).await {
        Ok(files) => docs::upload(&state, &user, files).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(stored) => {
            tracing::info!(user_id = user.id, count = stored.len(), "Upload finished");
            flash.success("/", "Files uploaded successfully.")
        }
        Err(e) => flash_failure(flash, "/upload/", "upload", e),
    }
}

/// POST /analyze/:doc_id/
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    flash: Flash,
    Path(doc_id): Path<i64>,
) -> Response {
    match docs::analyze(&state, &user, doc_id).await {
        Ok(()) => flash.success("/", format!("Document {} analyzed successfully.", doc_id)),
        Err(e) => flash_failure(flash, "/", "analyze", e),
    }
}

/// GET /get_text/:doc_id/
pub async fn get_text(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    flash: Flash,
    Path(doc_id): Path<i64>,
) -> Response {
    match docs::fetch_text(&state, &user, doc_id).await {
        Ok(text) => Json(TextResponse { doc_id, text }).into_response(),
        Err(e) => flash_failure(flash, "/", "get text", e),
    }
}

/// POST /delete/:doc_id/
pub async fn delete(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    flash: Flash,
    Path(doc_id): Path<i64>,
) -> Response {
    match docs::delete(&state, &user, doc_id).await {
        Ok(()) => flash.success("/", format!("Document {} deleted successfully.", doc_id)),
        Err(e) => flash_failure(flash, "/", "delete", e),
    }
}
