//! Local checks applied to every uploaded file before it leaves the server

use thiserror::Error;

/// File types the analysis service accepts
pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "pdf"];

/// Upload ceiling: 5 MB
pub const MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("No files were selected.")]
    NoFiles,

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("File is too large: {name} ({size} bytes)")]
    TooLarge { name: String, size: u64 },
}

/// Lowercased extension of `name`, if it has one
pub fn file_extension(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Check format and size of one file; returns its extension on success
pub fn validate_upload(name: &str, size_bytes: u64) -> Result<String, UploadError> {
    let ext = file_extension(name)
        .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .ok_or_else(|| UploadError::UnsupportedFormat(name.to_string()))?;

    if size_bytes > MAX_UPLOAD_BYTES {
        return Err(UploadError::TooLarge {
            name: name.to_string(),
            size: size_bytes,
        });
    }

    Ok(ext)
}

/// Stored document size: whole kilobytes, rounded down
pub fn size_in_kb(size_bytes: u64) -> i64 {
    (size_bytes / 1024) as i64
}
