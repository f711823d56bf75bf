//! HTTP client module: configuration, retries and request execution.

mod client;
mod config;
mod outcome;
mod retry;

pub use client::HttpClient;
pub use config::{
    ClientConfig, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_WAIT_MAX_MS, DEFAULT_RETRY_WAIT_MIN_MS,
    DEFAULT_TIMEOUT_SECS,
};
pub use outcome::{Outcome, Response};
pub use retry::{RetryStrategy, is_retryable_status};
