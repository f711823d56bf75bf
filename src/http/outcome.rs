//! The value returned from every request.

use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::borrow::Cow;
use std::time::Duration;

use crate::error::ClientError;

/// A response that was received and read.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// HTTP status of the final attempt.
    pub status_code: u16,
    /// Time from building the request until the body was read.
    pub duration: Duration,
    /// Body bytes exactly as received, cut to the configured response limit.
    pub body: Vec<u8>,
    /// Reading stopped because the response limit was reached.
    pub(crate) limited: bool,
}

impl Response {
    /// Body as text.
    ///
    /// Invalid UTF-8 is replaced with U+FFFD. When the body was cut at the
    /// response limit, a partial trailing character is dropped and the text
    /// is never longer than the bytes that were read.
    pub fn text(&self) -> Cow<'_, str> {
        if !self.limited {
            return String::from_utf8_lossy(&self.body);
        }

        let text = String::from_utf8_lossy(without_partial_tail(&self.body));
        if text.len() <= self.body.len() {
            return text;
        }
        let mut end = self.body.len();
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        Cow::Owned(text[..end].to_string())
    }
}

/// Strips an incomplete UTF-8 sequence at the very end of `bytes`.
fn without_partial_tail(bytes: &[u8]) -> &[u8] {
    let mut offset = 0;
    loop {
        match std::str::from_utf8(&bytes[offset..]) {
            Ok(_) => return bytes,
            // No error length: the input ended in the middle of a character
            Err(e) => match e.error_len() {
                None => return &bytes[..offset + e.valid_up_to()],
                Some(len) => offset += e.valid_up_to() + len,
            },
        }
    }
}

/// Result of a single GET or POST call.
///
/// `url` is the canonical form of the requested URL, or the raw input if it
/// could not be parsed. Exactly one of response or error is present.
#[derive(Debug)]
pub struct Outcome {
    url: String,
    result: Result<Response, ClientError>,
}

impl Outcome {
    pub(crate) fn success(url: impl Into<String>, response: Response) -> Self {
        Self {
            url: url.into(),
            result: Ok(response),
        }
    }

    pub(crate) fn failure(url: impl Into<String>, error: ClientError) -> Self {
        Self {
            url: url.into(),
            result: Err(error),
        }
    }

    /// Canonical request URL, or the raw input if it did not parse.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns true if a response was received and read.
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// The response, if one was received.
    pub fn response(&self) -> Option<&Response> {
        self.result.as_ref().ok()
    }

    /// The error, if the call failed.
    pub fn error(&self) -> Option<&ClientError> {
        self.result.as_ref().err()
    }

    /// Status code of the response, or 0 if none was received.
    pub fn status_code(&self) -> u16 {
        self.response().map_or(0, |r| r.status_code)
    }

    /// Response body as text, or an empty string if none was received.
    ///
    /// See [`Response::text`] for how undecodable bytes are handled.
    pub fn body(&self) -> Cow<'_, str> {
        self.response().map_or(Cow::Borrowed(""), Response::text)
    }

    /// Raw response body, or an empty slice if none was received.
    pub fn body_bytes(&self) -> &[u8] {
        self.response()
            .map(|r| r.body.as_slice())
            .unwrap_or_default()
    }

    /// Elapsed seconds, or 0.0 if no response was received.
    pub fn duration_secs(&self) -> f64 {
        self.response().map_or(0.0, |r| r.duration.as_secs_f64())
    }

    /// Converts into the underlying tagged result.
    pub fn into_result(self) -> Result<Response, ClientError> {
        self.result
    }
}

impl Serialize for Outcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let status_code = self.status_code();
        let duration = self.duration_secs();
        let body = self.body();

        let mut state = serializer.serialize_struct("Outcome", 5)?;
        if status_code != 0 {
            state.serialize_field("statusCode", &status_code)?;
        } else {
            state.skip_field("statusCode")?;
        }
        if !self.url.is_empty() {
            state.serialize_field("URL", &self.url)?;
        } else {
            state.skip_field("URL")?;
        }
        if duration != 0.0 {
            state.serialize_field("duration", &duration)?;
        } else {
            state.skip_field("duration")?;
        }
        if !body.is_empty() {
            state.serialize_field("responseBody", &*body)?;
        } else {
            state.skip_field("responseBody")?;
        }
        match self.error() {
            Some(error) => state.serialize_field("err", &error.to_string())?,
            None => state.skip_field("err")?,
        }
        state.end()
    }
}
