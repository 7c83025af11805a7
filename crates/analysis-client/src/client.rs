use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::AnalysisError;
use crate::retry::RetryMode;
use crate::types::{ErrorBody, TextResponse, UploadResponse};
use crate::AnalysisApi;

/// Fallback when a failure response carries no readable message
const UNKNOWN_ERROR: &str = "Unknown error.";

/// reqwest-backed [`AnalysisApi`] implementation
pub struct HttpAnalysisClient {
    client: reqwest::Client,
    config: ClientConfig,
    base: String,
}

impl HttpAnalysisClient {
    pub fn new(config: ClientConfig) -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AnalysisError::Client(e.to_string()))?;
        let base = config.endpoint_base();

        Ok(Self {
            client,
            config,
            base,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.config.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Send the request produced by `build`, retrying per the configured policy.
    /// Only 2xx responses are returned as `Ok`.
    async fn execute<F>(&self, mode: RetryMode, url: &str, build: F) -> Result<Response, AnalysisError>
    where
        F: Fn() -> RequestBuilder,
    {
        let policy = self.config.retry;
        let mut retries = 0;

        loop {
            let err = match self.authorize(build()).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) => status_error(resp).await,
                Err(e) => self.transport_error(url, e),
            };

            if !policy.should_retry(mode, &err, retries) {
                return Err(err);
            }

            let delay = policy.delay_for(retries);
            warn!(
                url,
                retry = retries + 1,
                max_retries = policy.max_retries,
                error = %err,
                "Analysis service call failed, retrying in {:?}",
                delay
            );
            tokio::time::sleep(delay).await;
            retries += 1;
        }
    }

    fn transport_error(&self, url: &str, e: reqwest::Error) -> AnalysisError {
        if e.is_timeout() {
            AnalysisError::Timeout {
                url: url.to_string(),
                secs: self.config.timeout.as_secs(),
            }
        } else if e.is_connect() {
            AnalysisError::Connection {
                url: url.to_string(),
                message: e.to_string(),
            }
        } else {
            AnalysisError::Request(e.to_string())
        }
    }
}

async fn status_error(resp: Response) -> AnalysisError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| UNKNOWN_ERROR.to_string());

    AnalysisError::Status { status, message }
}

#[async_trait]
impl AnalysisApi for HttpAnalysisClient {
    async fn upload_document(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<i64, AnalysisError> {
        let url = self.url("/upload_doc");
        debug!(url = %url, file_name, size = bytes.len(), "Uploading document");

        let resp = self
            .execute(RetryMode::ConnectOnly, &url, || {
                let part = Part::bytes(bytes.clone()).file_name(file_name.to_string());
                self.client.post(&url).multipart(Form::new().part("file", part))
            })
            .await?;

        let body: UploadResponse = resp
            .json()
            .await
            .map_err(|e| AnalysisError::InvalidResponse(e.to_string()))?;

        info!(file_name, remote_id = body.id, "Document uploaded to analysis service");
        Ok(body.id)
    }

    async fn analyze_document(&self, remote_id: i64) -> Result<(), AnalysisError> {
        let url = self.url("/doc_analyse");
        debug!(url = %url, remote_id, "Requesting analysis");

        self.execute(RetryMode::Transient, &url, || {
            self.client
                .post(&url)
                .query(&[("document_id", remote_id)])
        })
        .await?;

        info!(remote_id, "Analysis completed");
        Ok(())
    }

    async fn fetch_text(&self, remote_id: i64) -> Result<Option<String>, AnalysisError> {
        let url = self.url(&format!("/get_text/{}", remote_id));
        debug!(url = %url, "Fetching extracted text");

        let resp = self
            .execute(RetryMode::Transient, &url, || self.client.get(&url))
            .await?;

        let body: TextResponse = resp
            .json()
            .await
            .map_err(|e| AnalysisError::InvalidResponse(e.to_string()))?;

        Ok(body.text)
    }

    async fn delete_document(&self, remote_id: i64) -> Result<(), AnalysisError> {
        let url = self.url("/delete_doc");
        debug!(url = %url, remote_id, "Deleting remote document");

        self.execute(RetryMode::Transient, &url, || {
            self.client
                .delete(&url)
                .query(&[("document_id", remote_id)])
        })
        .await?;

        info!(remote_id, "Remote document deleted");
        Ok(())
    }
}
