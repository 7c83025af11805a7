use thiserror::Error;

/// Failures talking to the analysis service
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("Cannot reach analysis service at {url}: {message}")]
    Connection { url: String, message: String },

    #[error("Request to analysis service failed: {0}")]
    Request(String),

    #[error("Request to {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    #[error("Analysis service returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Unexpected response from analysis service: {0}")]
    InvalidResponse(String),
}

impl AnalysisError {
    /// Whether a retry could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            AnalysisError::Connection { .. } | AnalysisError::Timeout { .. } => true,
            AnalysisError::Status { status, .. } => matches!(status, 500 | 502 | 503 | 504),
            AnalysisError::Client(_)
            | AnalysisError::Request(_)
            | AnalysisError::InvalidResponse(_) => false,
        }
    }

    /// HTTP status of the failed call, when the service answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            AnalysisError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
