//! Classification of attempts into retryable and final outcomes.

use reqwest::StatusCode;
use reqwest_middleware::ClientWithMiddleware;
use reqwest_retry::policies::ExponentialBackoff;
use reqwest_retry::{
    Jitter, RetryTransientMiddleware, Retryable, RetryableStrategy, default_on_request_failure,
};

use super::config::ClientConfig;

/// Returns true if a response with this status is worth another attempt.
///
/// Rate limiting (429) and server errors are retried, except 501 which will
/// not change on a second try.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || (status.is_server_error() && status != StatusCode::NOT_IMPLEMENTED)
}

/// Retry strategy handed to the retry middleware.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryStrategy;

impl RetryableStrategy for RetryStrategy {
    fn handle(
        &self,
        res: &Result<reqwest::Response, reqwest_middleware::Error>,
    ) -> Option<Retryable> {
        match res {
            Ok(response) if is_retryable_status(response.status()) => Some(Retryable::Transient),
            Ok(_) => None,
            // Connect errors and timeouts are transient, everything else is fatal
            Err(error) => default_on_request_failure(error),
        }
    }
}

/// Wraps a reqwest client with the retry middleware configured from `config`.
///
/// Waits between attempts grow exponentially and always stay within
/// `[retry_wait_min, retry_wait_max]`. The middleware's per-attempt log lines
/// are emitted at TRACE, so they stay out of ordinary application logs.
pub fn with_retries(client: reqwest::Client, config: &ClientConfig) -> ClientWithMiddleware {
    let policy = ExponentialBackoff::builder()
        .retry_bounds(config.retry_wait_min(), config.retry_wait_max())
        .jitter(Jitter::Bounded)
        .build_with_max_retries(config.max_retries);

    let middleware =
        RetryTransientMiddleware::new_with_policy_and_strategy(policy, RetryStrategy)
            .with_retry_log_level(tracing::Level::TRACE);

    reqwest_middleware::ClientBuilder::new(client)
        .with(middleware)
        .build()
}
