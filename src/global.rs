//! Process-wide default client behind the crate-level `get` and `post`.
//!
//! New code should prefer building an [`HttpClient`] and passing it around.

use log::debug;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::error::ClientError;
use crate::http::{ClientConfig, HttpClient, Outcome};

static DEFAULT_CLIENT: RwLock<Option<HttpClient>> = RwLock::new(None);

/// Returns the default client, building it from [`ClientConfig::default`] on first use.
pub fn default_client() -> Result<HttpClient, ClientError> {
    if let Some(client) = DEFAULT_CLIENT
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
    {
        return Ok(client.clone());
    }

    let mut slot = DEFAULT_CLIENT
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    match slot.as_ref() {
        Some(client) => Ok(client.clone()),
        None => {
            let client = HttpClient::new(ClientConfig::default())?;
            *slot = Some(client.clone());
            Ok(client)
        }
    }
}

/// Replaces the default client with one built from `config`.
///
/// Calls already in flight finish with the client they started with.
pub fn set_global_default(config: ClientConfig) -> Result<(), ClientError> {
    let client = HttpClient::new(config)?;
    debug!("Replacing default HTTP client: {:?}", client.config());
    *DEFAULT_CLIENT
        .write()
        .unwrap_or_else(PoisonError::into_inner) = Some(client);
    Ok(())
}

/// Sends a POST request through the default client.
pub async fn post(
    url: &str,
    headers: &HashMap<String, String>,
    body: impl Into<Vec<u8>>,
) -> Outcome {
    match default_client() {
        Ok(client) => client.post(url, headers, body).await,
        Err(e) => Outcome::failure(url, e),
    }
}

/// Sends a GET request through the default client.
pub async fn get(url: &str, headers: &HashMap<String, String>) -> Outcome {
    match default_client() {
        Ok(client) => client.get(url, headers).await,
        Err(e) => Outcome::failure(url, e),
    }
}
