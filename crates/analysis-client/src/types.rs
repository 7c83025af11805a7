use serde::{Deserialize, Serialize};

/// Body of a successful `POST /upload_doc`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(alias = "document_id", alias = "doc_id")]
    pub id: i64,
}

/// Body of a successful `GET /get_text/{id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextResponse {
    #[serde(default)]
    pub text: Option<String>,
}

/// Failure body the service may send with a non-2xx status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default, alias = "detail")]
    pub message: Option<String>,
}
