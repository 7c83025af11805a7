//! Bounded retry with exponential backoff

use std::time::Duration;

use crate::error::AnalysisError;

/// Longest single wait between attempts
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Which failures a call may be retried on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryMode {
    /// Only when the connection could not be made, so the request never
    /// reached the service. Used for uploads, which are not idempotent.
    ConnectOnly,
    /// Connection failures, timeouts and 5xx answers
    Transient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; 0 disables retrying
    pub max_retries: u32,
    /// Wait before the first retry, doubled for each further one
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Wait before retry number `retry` (0-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(MAX_BACKOFF)
    }

    /// Whether `err`, seen after `retries_done` retries, earns another attempt
    pub fn should_retry(&self, mode: RetryMode, err: &AnalysisError, retries_done: u32) -> bool {
        if retries_done >= self.max_retries {
            return false;
        }
        match mode {
            RetryMode::ConnectOnly => matches!(err, AnalysisError::Connection { .. }),
            RetryMode::Transient => err.is_transient(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection() -> AnalysisError {
        AnalysisError::Connection {
            url: "http://x".into(),
            message: "refused".into(),
        }
    }

    fn unavailable() -> AnalysisError {
        AnalysisError::Status {
            status: 503,
            message: "busy".into(),
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 10,
            base_delay: Duration::from_millis(200),
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(200));
        assert_eq!(policy.delay_for(1), Duration::from_millis(400));
        assert_eq!(policy.delay_for(2), Duration::from_millis(800));
        assert_eq!(policy.delay_for(8), MAX_BACKOFF);
        assert_eq!(policy.delay_for(40), MAX_BACKOFF);
    }

    #[test]
    fn test_retry_budget_is_bounded() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(RetryMode::Transient, &unavailable(), 0));
        assert!(policy.should_retry(RetryMode::Transient, &unavailable(), 1));
        assert!(!policy.should_retry(RetryMode::Transient, &unavailable(), 2));
        assert!(!RetryPolicy::none().should_retry(RetryMode::Transient, &connection(), 0));
    }

    #[test]
    fn test_connect_only_mode() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(RetryMode::ConnectOnly, &connection(), 0));
        assert!(!policy.should_retry(RetryMode::ConnectOnly, &unavailable(), 0));
        let timeout = AnalysisError::Timeout {
            url: "http://x".into(),
            secs: 1,
        };
        assert!(!policy.should_retry(RetryMode::ConnectOnly, &timeout, 0));
        assert!(policy.should_retry(RetryMode::Transient, &timeout, 0));
    }

    #[test]
    fn test_client_errors_not_retried() {
        let bad_request = AnalysisError::Status {
            status: 400,
            message: "bad".into(),
        };
        assert!(!RetryPolicy::default().should_retry(RetryMode::Transient, &bad_request, 0));
    }
}
