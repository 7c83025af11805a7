//! Document workflow: listing, upload, analysis, text and deletion
//!
//! Every call to the analysis service happens before the matching local
//! write, so a failed remote call leaves the database and media directory
//! untouched.

use std::path::{Path, PathBuf};

use chrono::Utc;
use shared_types::{size_in_kb, validate_upload, Document, DocumentId, UploadError, User};
use sqlx::SqlitePool;

use crate::error::ServiceError;
use crate::models::{DbDocument, DocumentPage, PageInfo};
use crate::services::cart;
use crate::state::AppState;

/// Documents per page on the main page
pub const PAGE_SIZE: i64 = 3;

/// Shown when the service answers without any text
pub const TEXT_UNAVAILABLE: &str = "Text unavailable.";

/// Subdirectory of the media root holding uploads
pub const UPLOAD_DIR: &str = "uploads";

pub const UPLOAD_FAILED: &str = "Failed to upload the file to the analysis service.";
pub const ANALYSIS_FAILED: &str = "Document analysis failed.";
pub const TEXT_FAILED: &str = "Failed to retrieve the document text.";
pub const DELETE_FAILED: &str = "Failed to delete the document from the analysis service.";
pub const PAYMENT_REQUIRED: &str = "Payment is required before the document can be analyzed.";
pub const DELETE_FORBIDDEN: &str = "You cannot delete this file.";

/// A file received in an upload request
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Page number for `requested`; garbage means page 1, out of range means the
/// nearest valid page
pub fn page_info(requested: Option<&str>, total: i64, per_page: i64) -> PageInfo {
    let num_pages = ((total + per_page - 1) / per_page).max(1);
    let number = requested
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .unwrap_or(1)
        .clamp(1, num_pages);

    PageInfo {
        number,
        num_pages,
        has_previous: number > 1,
        has_next: number < num_pages,
        total,
    }
}

/// Last path component, with anything outside `[A-Za-z0-9._-]` replaced
pub fn safe_file_name(name: &str) -> String {
    let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

/// The user's documents, newest first, one page at a time
pub async fn list(
    db: &SqlitePool,
    user: &User,
    requested_page: Option<&str>,
) -> Result<DocumentPage, ServiceError> {
    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM documents WHERE user_id = ?")
        .bind(user.id)
        .fetch_one(db)
        .await?;

    let page = page_info(requested_page, total, PAGE_SIZE);
    let rows: Vec<DbDocument> = sqlx::query_as(
        "SELECT * FROM documents WHERE user_id = ? ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
    )
    .bind(user.id)
    .bind(PAGE_SIZE)
    .bind((page.number - 1) * PAGE_SIZE)
    .fetch_all(db)
    .await?;

    Ok(DocumentPage {
        documents: rows.into_iter().map(Document::from).collect(),
        page,
        cart_document_ids: cart::document_ids_in_cart(db, user).await?,
    })
}

/// Document `doc_id` if `user` owns it
pub async fn find_owned(
    db: &SqlitePool,
    user: &User,
    doc_id: DocumentId,
) -> Result<Document, ServiceError> {
    let row: Option<DbDocument> =
        sqlx::query_as("SELECT * FROM documents WHERE id = ? AND user_id = ?")
            .bind(doc_id)
            .bind(user.id)
            .fetch_optional(db)
            .await?;

    row.map(Document::from)
        .ok_or_else(|| ServiceError::not_found(cart::DOCUMENT_NOT_OWNED))
}

async fn find_any(db: &SqlitePool, doc_id: DocumentId) -> Result<Document, ServiceError> {
    let row: Option<DbDocument> = sqlx::query_as("SELECT * FROM documents WHERE id = ?")
        .bind(doc_id)
        .fetch_optional(db)
        .await?;

    row.map(Document::from)
        .ok_or_else(|| ServiceError::not_found(format!("Document {} not found.", doc_id)))
}

async fn write_media_file(root: &Path, file: &UploadedFile) -> Result<String, ServiceError> {
    let relative = format!(
        "{}/{}_{}",
        UPLOAD_DIR,
        uuid::Uuid::new_v4().simple(),
        safe_file_name(&file.file_name)
    );
    let path = root.join(&relative);
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    tokio::fs::write(&path, &file.bytes).await?;
    Ok(relative)
}

async fn remove_media_file(root: &Path, relative: &str) {
    let path: PathBuf = root.join(relative);
    match tokio::fs::remove_file(&path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), "Failed to remove media file: {}", e),
    }
}

/// Write the file and its record; the file is removed again if the insert fails
async fn store_upload(
    state: &AppState,
    user: &User,
    file: &UploadedFile,
    file_name: &str,
    remote_id: i64,
) -> Result<DocumentId, ServiceError> {
    let relative = write_media_file(&state.config.media_root, file).await?;
    let inserted = sqlx::query(
        r#"
        INSERT INTO documents (user_id, file_path, file_name, size_kb, remote_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user.id)
    .bind(&relative)
    .bind(file_name)
    .bind(size_in_kb(file.bytes.len() as u64))
    .bind(remote_id)
    .bind(Utc::now())
    .execute(&state.db)
    .await;

    match inserted {
        Ok(result) => Ok(result.last_insert_rowid()),
        Err(e) => {
            remove_media_file(&state.config.media_root, &relative).await;
            Err(e.into())
        }
    }
}

/// Best-effort removal of a remote document that has no local record
async fn discard_remote(state: &AppState, remote_id: i64) {
    match state.analysis.delete_document(remote_id).await {
        Ok(()) => tracing::info!(remote_id, "Discarded remote document after local failure"),
        Err(e) => tracing::error!(remote_id, "Failed to discard orphaned remote document: {}", e),
    }
}

/// Validate every file, then send each one to the analysis service and store
/// it locally under the id the service returned
pub async fn upload(
    state: &AppState,
    user: &User,
    files: Vec<UploadedFile>,
) -> Result<Vec<Document>, ServiceError> {
    if files.is_empty() {
        return Err(UploadError::NoFiles.into());
    }
    for file in &files {
        validate_upload(&file.file_name, file.bytes.len() as u64)?;
    }

    let mut stored = Vec::with_capacity(files.len());
    for file in files {
        let file_name = safe_file_name(&file.file_name);
        let remote_id = state
            .analysis
            .upload_document(&file_name, file.bytes.clone())
            .await
            .map_err(|e| ServiceError::upstream(UPLOAD_FAILED, e))?;

        let id = match store_upload(state, user, &file, &file_name, remote_id).await {
            Ok(id) => id,
            Err(e) => {
                discard_remote(state, remote_id).await;
                return Err(e);
            }
        };

        tracing::info!(user_id = user.id, doc_id = id, remote_id, file_name = %file_name, "Document uploaded");
        stored.push(find_owned(&state.db, user, id).await?);
    }

    Ok(stored)
}

/// Set the analysis flag; false when another request already set it
async fn mark_analyzed(db: &SqlitePool, doc_id: DocumentId) -> Result<bool, ServiceError> {
    let done = sqlx::query("UPDATE documents SET analysis_done = 1 WHERE id = ? AND analysis_done = 0")
        .bind(doc_id)
        .execute(db)
        .await?;
    Ok(done.rows_affected() == 1)
}

/// Run analysis on a paid document that has not been analyzed yet
pub async fn analyze(state: &AppState, user: &User, doc_id: DocumentId) -> Result<(), ServiceError> {
    let document = find_owned(&state.db, user, doc_id).await?;
    if !document.payment_status {
        return Err(ServiceError::validation(PAYMENT_REQUIRED));
    }
    if document.analysis_done {
        return Err(ServiceError::AlreadyInState(format!(
            "Document {} has already been analyzed.",
            doc_id
        )));
    }

    state
        .analysis
        .analyze_document(document.remote_id)
        .await
        .map_err(|e| ServiceError::upstream(ANALYSIS_FAILED, e))?;

    if mark_analyzed(&state.db, doc_id).await? {
        tracing::info!(user_id = user.id, doc_id, "Document analyzed");
    } else {
        tracing::warn!(user_id = user.id, doc_id, "Document was already marked analyzed");
    }
    Ok(())
}

/// Fetch the extracted text and cache it on the document
pub async fn fetch_text(
    state: &AppState,
    user: &User,
    doc_id: DocumentId,
) -> Result<String, ServiceError> {
    let document = find_owned(&state.db, user, doc_id).await?;

    let text = state
        .analysis
        .fetch_text(document.remote_id)
        .await
        .map_err(|e| ServiceError::upstream(TEXT_FAILED, e))?
        .unwrap_or_else(|| TEXT_UNAVAILABLE.to_string());

    sqlx::query("UPDATE documents SET extracted_text = ? WHERE id = ?")
        .bind(&text)
        .bind(doc_id)
        .execute(&state.db)
        .await?;

    Ok(text)
}

/// Delete remotely, then locally; owners and staff only
pub async fn delete(state: &AppState, user: &User, doc_id: DocumentId) -> Result<(), ServiceError> {
    let document = find_any(&state.db, doc_id).await?;
    if !document.is_owned_by(user.id) && !user.is_staff {
        return Err(ServiceError::Forbidden(DELETE_FORBIDDEN.to_string()));
    }

    state
        .analysis
        .delete_document(document.remote_id)
        .await
        .map_err(|e| ServiceError::upstream(DELETE_FAILED, e))?;

    let mut tx = state.db.begin().await?;
    sqlx::query("DELETE FROM cart_entries WHERE document_id = ?")
        .bind(doc_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM documents WHERE id = ?")
        .bind(doc_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    remove_media_file(&state.config.media_root, &document.file_path).await;
    tracing::info!(user_id = user.id, doc_id, owner_id = document.owner_id, "Document deleted");
    Ok(())
}
