//! Errors reported inside an [`Outcome`](crate::Outcome).

/// Everything that can go wrong between parsing a URL and reading a body.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The URL could not be parsed; no request was sent.
    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },

    /// A caller-supplied header has an illegal name or value.
    #[error("invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },

    /// The request could not be assembled.
    #[error("failed to build request: {0}")]
    Request(#[source] reqwest::Error),

    /// No response was obtained, after retries where applicable.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest_middleware::Error),

    /// The server kept answering with a retryable status until the retry budget ran out.
    #[error("giving up after {attempts} attempt(s): last response was HTTP {status}")]
    RetriesExhausted { attempts: u32, status: u16 },

    /// Reading the response body failed for a reason other than end-of-stream.
    #[error("failed to read response body: {0}")]
    BodyRead(#[source] reqwest::Error),

    /// The client configuration was rejected.
    #[error("invalid client configuration: {0}")]
    InvalidConfig(String),

    /// The underlying HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Engine(#[source] reqwest::Error),
}

impl ClientError {
    /// Returns true if the error happened before anything was sent.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            ClientError::InvalidUrl { .. }
                | ClientError::InvalidHeader { .. }
                | ClientError::Request(_)
                | ClientError::InvalidConfig(_)
                | ClientError::Engine(_)
        )
    }
}
