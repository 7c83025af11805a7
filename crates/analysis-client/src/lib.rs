//! Client for the external document analysis service
//!
//! The analysis service owns the actual content analysis. This crate only
//! proxies four calls to it:
//!
//! - `POST /upload_doc` (multipart `file`) returns the remote document id
//! - `POST /doc_analyse?document_id=` starts analysis
//! - `GET /get_text/{id}` returns `{"text": ...}`
//! - `DELETE /delete_doc?document_id=` removes the remote copy
//!
//! Every call has a request timeout. Transient failures are retried a
//! bounded number of times with exponential backoff (see [`RetryPolicy`]).
//!
//! Callers depend on the [`AnalysisApi`] trait so the workflow layer can be
//! exercised against a fake in tests.

mod client;
mod config;
mod error;
mod retry;
mod types;

pub use client::HttpAnalysisClient;
pub use config::ClientConfig;
pub use error::AnalysisError;
pub use retry::{RetryMode, RetryPolicy};
pub use types::{ErrorBody, TextResponse, UploadResponse};

use async_trait::async_trait;

/// Operations the docshop workflow needs from the analysis service
#[async_trait]
pub trait AnalysisApi: Send + Sync {
    /// Upload file bytes; returns the id the service assigned
    async fn upload_document(&self, file_name: &str, bytes: Vec<u8>)
        -> Result<i64, AnalysisError>;

    /// Ask the service to analyze a previously uploaded document
    async fn analyze_document(&self, remote_id: i64) -> Result<(), AnalysisError>;

    /// Extracted text, `None` when the service answered without a `text` field
    async fn fetch_text(&self, remote_id: i64) -> Result<Option<String>, AnalysisError>;

    /// Remove the document from the service
    async fn delete_document(&self, remote_id: i64) -> Result<(), AnalysisError>;
}
