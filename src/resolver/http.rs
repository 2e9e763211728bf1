//! GET-and-decode helper shared by every remote lookup

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use crate::error::BotError;

const API_KEY_HEADER: &str = "X-Api-Key";

/// Build the HTTP client used by the resolvers
pub fn build_client(timeout: Option<Duration>) -> Result<Client, BotError> {
    let mut builder = Client::builder().user_agent(concat!("kube2iam-bot/", env!("CARGO_PKG_VERSION")));
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }

    builder.build().map_err(|e| BotError::Transport {
        url: String::new(),
        reason: format!("failed to build HTTP client: {}", e),
    })
}

/// Issue a GET and decode the JSON body into `T`
///
/// Anything but a 200 is a transport failure; the body is only decoded once
/// the status has been checked.
pub async fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    api_key: Option<&str>,
) -> Result<T, BotError> {
    let mut request = client.get(url);
    if let Some(key) = api_key {
        request = request.header(API_KEY_HEADER, key);
    }

    let response = request.send().await.map_err(|e| {
        error!(url = %url, error = %e, "Request failed");
        BotError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        }
    })?;

    let status = response.status();
    if status != StatusCode::OK {
        error!(url = %url, status = %status, "Unexpected status");
        return Err(BotError::Transport {
            url: url.to_string(),
            reason: format!("httpStatusCode={}({})", status.as_u16(), status),
        });
    }

    let body = response.text().await.map_err(|e| BotError::Transport {
        url: url.to_string(),
        reason: format!("failed to read response body: {}", e),
    })?;
    debug!(url = %url, body = %body, "Lookup response");

    serde_json::from_str(&body).map_err(|e| BotError::Decode {
        url: url.to_string(),
        reason: e.to_string(),
    })
}
