//! Small HTTP client for GET and POST requests with automatic retries, a
//! per-client timeout and optional response-body truncation.
//!
//! Every call returns an [`Outcome`]; failures are carried inside it rather
//! than returned as `Err`, so callers branch on [`Outcome::error`].
//!
//! ```no_run
//! use std::collections::HashMap;
//!
//! # async fn run() {
//! let outcome = rehttp::get("https://example.com/", &HashMap::new()).await;
//! match outcome.error() {
//!     Some(e) => eprintln!("{} failed: {}", outcome.url(), e),
//!     None => println!("{} {}", outcome.status_code(), outcome.body()),
//! }
//! # }
//! ```

pub mod error;
pub mod global;
pub mod http;

pub use error::ClientError;
pub use global::{default_client, get, post, set_global_default};
pub use http::{ClientConfig, HttpClient, Outcome, Response};
