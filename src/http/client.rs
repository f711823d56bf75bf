//! HTTP client with built-in retries, a timeout and an optional body limit.

use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Url};
use reqwest_middleware::ClientWithMiddleware;
use std::collections::HashMap;
use std::time::Instant;

use super::config::ClientConfig;
use super::outcome::{Outcome, Response};
use super::retry::{is_retryable_status, with_retries};
use crate::error::ClientError;

/// HTTP client that owns one retrying engine built from a [`ClientConfig`].
///
/// Cloning is cheap and shares the connection pool.
#[derive(Clone)]
pub struct HttpClient {
    client: ClientWithMiddleware,
    config: ClientConfig,
}

impl HttpClient {
    /// Builds the engine for `config`.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.effective_user_agent())
            .build()
            .map_err(ClientError::Engine)?;

        debug!(
            "Built HTTP client: timeout={}s, max_retries={}, response_limit={}",
            config.timeout_secs, config.max_retries, config.response_limit
        );

        Ok(Self {
            client: with_retries(client, &config),
            config,
        })
    }

    /// The configuration this client was built from.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Sends a POST request with `body`.
    pub async fn post(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        body: impl Into<Vec<u8>>,
    ) -> Outcome {
        self.execute(Method::POST, url, headers, Some(body.into()))
            .await
    }

    /// Sends a GET request.
    pub async fn get(&self, url: &str, headers: &HashMap<String, String>) -> Outcome {
        self.execute(Method::GET, url, headers, None).await
    }

    #[tracing::instrument(skip(self, headers, body))]
    async fn execute(
        &self,
        method: Method,
        url: &str,
        headers: &HashMap<String, String>,
        body: Option<Vec<u8>>,
    ) -> Outcome {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(source) => {
                debug!("Rejected malformed URL {:?}: {}", url, source);
                return Outcome::failure(
                    url,
                    ClientError::InvalidUrl {
                        url: url.to_string(),
                        source,
                    },
                );
            }
        };
        let canonical = parsed.to_string();

        match self.send(method.clone(), parsed, headers, body).await {
            Ok(response) => {
                debug!(
                    "{} {} -> {} ({} bytes in {:.3}s)",
                    method,
                    canonical,
                    response.status_code,
                    response.body.len(),
                    response.duration.as_secs_f64()
                );
                Outcome::success(canonical, response)
            }
            Err(e) => {
                warn!("{} {} failed: {}", method, canonical, e);
                Outcome::failure(canonical, e)
            }
        }
    }

    /// Single call through the engine; retries happen inside it.
    async fn send(
        &self,
        method: Method,
        url: Url,
        headers: &HashMap<String, String>,
        body: Option<Vec<u8>>,
    ) -> Result<Response, ClientError> {
        let start = Instant::now();

        let mut builder = self.client.request(method, url);
        if let Some(body) = body {
            builder = builder.body(body);
        }
        let mut request = builder.build().map_err(ClientError::Request)?;
        apply_headers(request.headers_mut(), headers)?;

        let response = self.client.execute(request).await?;

        let status = response.status();
        if is_retryable_status(status) {
            return Err(ClientError::RetriesExhausted {
                attempts: self.config.max_retries.saturating_add(1),
                status: status.as_u16(),
            });
        }

        let (body, limited) = read_body(response, self.config.response_limit).await?;

        Ok(Response {
            status_code: status.as_u16(),
            duration: start.elapsed(),
            body,
            limited,
        })
    }
}

/// Inserts each header, replacing any value already present under that name.
fn apply_headers(
    target: &mut HeaderMap,
    headers: &HashMap<String, String>,
) -> Result<(), ClientError> {
    for (key, value) in headers {
        let name =
            HeaderName::from_bytes(key.as_bytes()).map_err(|e| ClientError::InvalidHeader {
                name: key.clone(),
                reason: e.to_string(),
            })?;
        let value = HeaderValue::from_str(value).map_err(|e| ClientError::InvalidHeader {
            name: key.clone(),
            reason: e.to_string(),
        })?;
        target.insert(name, value);
    }
    Ok(())
}

/// Reads the body, stopping after `limit` bytes unless `limit` is 0.
///
/// Returns the bytes and whether reading stopped at the limit. The response is
/// consumed, so its connection is released on every return.
async fn read_body(
    mut response: reqwest::Response,
    limit: u64,
) -> Result<(Vec<u8>, bool), ClientError> {
    let mut body = Vec::new();

    loop {
        let remaining = match limit {
            0 => usize::MAX,
            limit => {
                let left = limit.saturating_sub(body.len() as u64);
                if left == 0 {
                    debug!("Response body truncated at {} bytes", limit);
                    return Ok((body, true));
                }
                usize::try_from(left).unwrap_or(usize::MAX)
            }
        };

        match response.chunk().await {
            Ok(Some(chunk)) => body.extend_from_slice(&chunk[..chunk.len().min(remaining)]),
            Ok(None) => break,
            Err(e) if is_end_of_stream(&e) => {
                debug!("Response body ended early after {} bytes", body.len());
                break;
            }
            Err(e) => return Err(ClientError::BodyRead(e)),
        }
    }

    Ok((body, false))
}

/// Checks whether a body error only means the stream ended, cleanly or not.
///
/// A short Content-Length body surfaces as an `io::ErrorKind::UnexpectedEof`
/// somewhere in the source chain, which is the primary check.
fn is_end_of_stream(error: &reqwest::Error) -> bool {
    let unexpected_eof = error_chain(error).any(|err| {
        err.downcast_ref::<std::io::Error>()
            .is_some_and(|io| io.kind() == std::io::ErrorKind::UnexpectedEof)
    });
    if unexpected_eof {
        return true;
    }

    // hyper reports a connection closed mid-message as its own private error
    // kind with no io::Error underneath, so only its message identifies it.
    // Keep in step with hyper's wording when upgrading.
    error_chain(error).any(|err| {
        err.to_string()
            .contains("connection closed before message completed")
    })
}

/// Iterates over `error` and its sources.
fn error_chain<'a>(
    error: &'a (dyn std::error::Error + 'static),
) -> impl Iterator<Item = &'a (dyn std::error::Error + 'static)> {
    std::iter::successors(Some(error), |&err| err.source())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_client(max_retries: u32, response_limit: u64) -> HttpClient {
        let config = ClientConfig::new(5, max_retries, response_limit)
            .with_retry_wait(Duration::from_millis(10), Duration::from_millis(20));
        HttpClient::new(config).unwrap()
    }

    fn no_headers() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let result = HttpClient::new(ClientConfig::new(0, 3, 0));
        assert!(matches!(result, Err(ClientError::InvalidConfig(_))));
    }

    #[test]
    fn test_apply_headers_overrides_existing() {
        let mut target = HeaderMap::new();
        target.insert("user-agent", HeaderValue::from_static("default"));

        let headers = HashMap::from([("User-Agent".to_string(), "custom".to_string())]);
        apply_headers(&mut target, &headers).unwrap();

        assert_eq!(target.get_all("user-agent").iter().count(), 1);
        assert_eq!(target["user-agent"], "custom");
    }

    #[test]
    fn test_apply_headers_rejects_invalid_name() {
        let mut target = HeaderMap::new();
        let headers = HashMap::from([("bad header".to_string(), "1".to_string())]);
        let err = apply_headers(&mut target, &headers).unwrap_err();
        assert!(matches!(err, ClientError::InvalidHeader { ref name, .. } if name == "bad header"));
    }

    #[test]
    fn test_apply_headers_rejects_invalid_value() {
        let mut target = HeaderMap::new();
        let headers = HashMap::from([("X-Test".to_string(), "a\nb".to_string())]);
        assert!(apply_headers(&mut target, &headers).is_err());
    }

    #[tokio::test]
    async fn test_get_success() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/test")
            .with_status(200)
            .with_body("hello world")
            .create_async()
            .await;

        let outcome = test_client(0, 0)
            .get(&format!("{}/test", url), &no_headers())
            .await;

        mock.assert_async().await;
        assert!(outcome.is_ok(), "{:?}", outcome.error());
        assert_eq!(outcome.status_code(), 200);
        assert_eq!(outcome.body(), "hello world");
        assert_eq!(outcome.url(), format!("{}/test", url));
        assert!(outcome.duration_secs() >= 0.0);
    }

    #[tokio::test]
    async fn test_get_invalid_url() {
        let outcome = test_client(0, 0).get("not a url", &no_headers()).await;

        assert_eq!(outcome.url(), "not a url");
        assert!(matches!(
            outcome.error(),
            Some(ClientError::InvalidUrl { .. })
        ));
        assert_eq!(outcome.status_code(), 0);
        assert_eq!(outcome.body(), "");
    }

    #[tokio::test]
    async fn test_url_is_canonicalized() {
        let mut server = mockito::Server::new_async().await;
        let _m = server.mock("GET", "/").with_status(204).create_async().await;

        // No path: the canonical form gains a trailing slash
        let outcome = test_client(0, 0).get(&server.url(), &no_headers()).await;

        assert_eq!(outcome.status_code(), 204);
        assert_eq!(outcome.url(), format!("{}/", server.url()));
    }

    #[tokio::test]
    async fn test_post_sends_body_and_headers() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("POST", "/echo")
            .match_header("x-test", "1")
            .match_body("hello")
            .with_status(200)
            .with_body("POST hello")
            .create_async()
            .await;

        let headers = HashMap::from([("X-Test".to_string(), "1".to_string())]);
        let outcome = test_client(0, 0)
            .post(&format!("{}/echo", url), &headers, b"hello".to_vec())
            .await;

        mock.assert_async().await;
        assert_eq!(outcome.status_code(), 200);
        assert!(outcome.body().contains("hello"));
        assert!(outcome.error().is_none());
    }

    #[tokio::test]
    async fn test_caller_header_overrides_user_agent() {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("GET", "/")
            .match_header("user-agent", "custom-agent")
            .with_status(200)
            .create_async()
            .await;

        let headers = HashMap::from([("User-Agent".to_string(), "custom-agent".to_string())]);
        let outcome = test_client(0, 0).get(&server.url(), &headers).await;

        mock.assert_async().await;
        assert_eq!(outcome.status_code(), 200);
    }

    #[tokio::test]
    async fn test_default_user_agent_is_sent() {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("GET", "/")
            .match_header("user-agent", mockito::Matcher::Regex("^rehttp/".to_string()))
            .with_status(200)
            .create_async()
            .await;

        let outcome = test_client(0, 0).get(&server.url(), &no_headers()).await;

        mock.assert_async().await;
        assert_eq!(outcome.status_code(), 200);
    }

    #[tokio::test]
    async fn test_response_limit_truncates_body() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/big")
            .with_status(200)
            .with_body("x".repeat(1000))
            .create_async()
            .await;

        let outcome = test_client(0, 10)
            .get(&format!("{}/big", server.url()), &no_headers())
            .await;

        assert!(outcome.is_ok());
        assert_eq!(outcome.body(), "x".repeat(10));
    }

    #[tokio::test]
    async fn test_response_limit_larger_than_body() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/small")
            .with_status(200)
            .with_body("tiny")
            .create_async()
            .await;

        let outcome = test_client(0, 1024)
            .get(&format!("{}/small", server.url()), &no_headers())
            .await;

        assert_eq!(outcome.body(), "tiny");
    }

    #[tokio::test]
    async fn test_client_error_status_is_not_an_error() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/missing")
            .with_status(404)
            .with_body("not here")
            .expect(1)
            .create_async()
            .await;

        let outcome = test_client(3, 0)
            .get(&format!("{}/missing", server.url()), &no_headers())
            .await;

        mock.assert_async().await;
        assert!(outcome.is_ok());
        assert_eq!(outcome.status_code(), 404);
        assert_eq!(outcome.body(), "not here");
    }

    #[tokio::test]
    async fn test_server_error_is_retried_until_exhausted() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/flaky")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let outcome = test_client(2, 0)
            .get(&format!("{}/flaky", server.url()), &no_headers())
            .await;

        mock.assert_async().await;
        assert!(matches!(
            outcome.error(),
            Some(ClientError::RetriesExhausted {
                attempts: 3,
                status: 503
            })
        ));
        assert_eq!(outcome.status_code(), 0);
    }

    #[tokio::test]
    async fn test_zero_retries_makes_one_attempt() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/down")
            .with_status(500)
            .expect(1)
            .create_async()
            .await;

        let outcome = test_client(0, 0)
            .post(&format!("{}/down", server.url()), &no_headers(), "payload")
            .await;

        mock.assert_async().await;
        assert!(matches!(
            outcome.error(),
            Some(ClientError::RetriesExhausted { attempts: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let outcome = test_client(0, 0)
            .get("http://127.0.0.1:1/", &no_headers())
            .await;

        assert_eq!(outcome.url(), "http://127.0.0.1:1/");
        assert!(matches!(outcome.error(), Some(ClientError::Transport(_))));
        assert_eq!(outcome.status_code(), 0);
    }

    #[tokio::test]
    async fn test_timeout_while_reading_body_is_body_read_error() {
        use std::io::Write;

        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/slow")
            .with_status(200)
            .with_chunked_body(|w| {
                w.write_all(b"part")?;
                w.flush()?;
                std::thread::sleep(Duration::from_millis(2500));
                w.write_all(b"late")
            })
            .create_async()
            .await;

        let config = ClientConfig::new(1, 0, 0);
        let outcome = HttpClient::new(config)
            .unwrap()
            .get(&format!("{}/slow", server.url()), &no_headers())
            .await;

        assert!(
            matches!(outcome.error(), Some(ClientError::BodyRead(_))),
            "{:?}",
            outcome.error()
        );
        assert_eq!(outcome.status_code(), 0);
        assert_eq!(outcome.body(), "");
    }

    #[tokio::test]
    async fn test_limit_never_splits_a_character_into_replacements() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/accents")
            .with_status(200)
            .with_body("éééé")
            .create_async()
            .await;

        for limit in 1..=8u64 {
            let outcome = test_client(0, limit)
                .get(&format!("{}/accents", server.url()), &no_headers())
                .await;

            assert_eq!(outcome.body_bytes(), &"éééé".as_bytes()[..limit as usize]);
            assert!(outcome.body().len() as u64 <= limit);
            assert!(!outcome.body().contains('\u{FFFD}'));
            assert_eq!(outcome.body(), "é".repeat(limit as usize / 2));
        }
    }

    #[tokio::test]
    async fn test_binary_body_is_kept_byte_for_byte() {
        let sent = vec![0xFF, 0xFE, 0x00, 0x80];

        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/binary")
            .with_status(200)
            .with_body(&sent)
            .create_async()
            .await;

        let outcome = test_client(0, 0)
            .get(&format!("{}/binary", server.url()), &no_headers())
            .await;

        assert!(outcome.is_ok());
        assert_eq!(outcome.body_bytes(), sent.as_slice());
    }
}
