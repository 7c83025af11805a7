use std::time::Duration;

use crate::retry::RetryPolicy;

/// Connection settings for [`crate::HttpAnalysisClient`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Direct base URL of the analysis service
    pub base_url: String,
    /// Proxy base URL used when a bearer token is configured
    pub proxy_url: Option<String>,
    /// Bearer token; enables the `Authorization` header and proxy routing
    pub token: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            proxy_url: None,
            token: None,
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_bearer(mut self, token: impl Into<String>, proxy_url: Option<String>) -> Self {
        self.token = Some(token.into());
        self.proxy_url = proxy_url;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Base URL every request goes to, without a trailing slash
    pub fn endpoint_base(&self) -> String {
        let base = match (&self.token, &self.proxy_url) {
            (Some(_), Some(proxy)) => proxy,
            _ => &self.base_url,
        };
        base.trim_end_matches('/').to_string()
    }
}
