//! Client configuration.

use serde::Deserialize;
use std::time::Duration;

use crate::error::ClientError;

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default maximum number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default lower bound of the backoff between attempts in milliseconds.
pub const DEFAULT_RETRY_WAIT_MIN_MS: u64 = 1000;

/// Default upper bound of the backoff between attempts in milliseconds.
pub const DEFAULT_RETRY_WAIT_MAX_MS: u64 = 30_000;

/// Settings for an [`HttpClient`](super::HttpClient).
///
/// Every field has a default, so a partial document deserializes:
///
/// ```
/// let config: rehttp::ClientConfig = serde_json::from_str(r#"{"max_retries": 0}"#).unwrap();
/// assert_eq!(config.timeout_secs, 10);
/// assert_eq!(config.max_retries, 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Timeout for a whole attempt, including reading the body.
    pub timeout_secs: u64,
    /// Retries after the first attempt. `0` means a single attempt.
    pub max_retries: u32,
    /// Maximum number of body bytes to read. `0` reads everything.
    pub response_limit: u64,
    /// Shortest wait before a retry, in milliseconds.
    pub retry_wait_min_ms: u64,
    /// Longest wait before a retry, in milliseconds.
    pub retry_wait_max_ms: u64,
    /// `User-Agent` sent unless the caller supplies one.
    pub user_agent: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            response_limit: 0,
            retry_wait_min_ms: DEFAULT_RETRY_WAIT_MIN_MS,
            retry_wait_max_ms: DEFAULT_RETRY_WAIT_MAX_MS,
            user_agent: None,
        }
    }
}

impl ClientConfig {
    /// Creates a configuration with default backoff bounds and user agent.
    pub fn new(timeout_secs: u64, max_retries: u32, response_limit: u64) -> Self {
        Self {
            timeout_secs,
            max_retries,
            response_limit,
            ..Self::default()
        }
    }

    /// Sets the backoff bounds between attempts.
    pub fn with_retry_wait(mut self, min: Duration, max: Duration) -> Self {
        self.retry_wait_min_ms = min.as_millis() as u64;
        self.retry_wait_max_ms = max.as_millis() as u64;
        self
    }

    /// Sets the default `User-Agent`.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Per-attempt timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Shortest wait before a retry.
    pub fn retry_wait_min(&self) -> Duration {
        Duration::from_millis(self.retry_wait_min_ms)
    }

    /// Longest wait before a retry.
    pub fn retry_wait_max(&self) -> Duration {
        Duration::from_millis(self.retry_wait_max_ms)
    }

    /// The user agent actually sent: the configured one or `rehttp/<version>`.
    pub fn effective_user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| format!("rehttp/{}", env!("REHTTP_VERSION")))
    }

    /// Rejects settings the engine cannot honor.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.timeout_secs == 0 {
            return Err(ClientError::InvalidConfig(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.retry_wait_min_ms > self.retry_wait_max_ms {
            return Err(ClientError::InvalidConfig(format!(
                "retry_wait_min_ms ({}) exceeds retry_wait_max_ms ({})",
                self.retry_wait_min_ms, self.retry_wait_max_ms
            )));
        }
        Ok(())
    }
}
