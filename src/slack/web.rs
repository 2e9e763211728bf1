//! Slack Web API calls: `rtm.connect` and `users.info`

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::error::BotError;

/// Envelope shared by Slack Web API responses
#[derive(Debug, Deserialize)]
struct SlackResponse<T> {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    body: Option<T>,
}

/// Payload of `rtm.connect`
#[derive(Debug, Clone, Deserialize)]
pub struct RtmConnect {
    /// Websocket URL for this session
    pub url: String,
    #[serde(rename = "self")]
    pub bot: BotIdentity,
}

/// The bot's own user
#[derive(Debug, Clone, Deserialize)]
pub struct BotIdentity {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct UsersInfo {
    user: SlackUser,
}

#[derive(Debug, Deserialize)]
struct SlackUser {
    profile: SlackProfile,
}

/// Name and email from a Slack user profile
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SlackProfile {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
}

/// Slack Web API client authenticated with the bot token
#[derive(Clone)]
pub struct SlackWebClient {
    client: Client,
    api_url: String,
    token: String,
}

impl SlackWebClient {
    pub fn new(client: Client, api_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            token: token.into(),
        }
    }

    /// Start an RTM session
    pub async fn rtm_connect(&self, rtm_connect_url: &str) -> Result<RtmConnect, BotError> {
        if self.token.is_empty() {
            return Err(BotError::Chat(
                "expected non-empty slackbot integration token".to_string(),
            ));
        }
        self.call(rtm_connect_url).await
    }

    /// Look up a user's profile
    pub async fn user_profile(&self, user_id: &str) -> Result<SlackProfile, BotError> {
        let url = format!(
            "{}/users.info?user={}",
            self.api_url.trim_end_matches('/'),
            urlencoding::encode(user_id)
        );
        let info: UsersInfo = self.call(&url).await?;
        Ok(info.user.profile)
    }

    async fn call<T: DeserializeOwned>(&self, url: &str) -> Result<T, BotError> {
        debug!(url = %url, "Calling Slack API");

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| BotError::Chat(format!("request to url={} failed, err={}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BotError::Chat(format!(
                "request to url={} failed, httpStatusCode={}({})",
                url,
                status.as_u16(),
                status
            )));
        }

        let parsed: SlackResponse<T> = response
            .json()
            .await
            .map_err(|e| BotError::Chat(format!("failed to parse response from url={}, err={}", url, e)))?;

        if !parsed.ok {
            return Err(BotError::Chat(format!(
                "Slack API error={} [url={}]",
                parsed.error.unwrap_or_else(|| "unknown".to_string()),
                url
            )));
        }

        parsed
            .body
            .ok_or_else(|| BotError::Chat(format!("empty response body from url={}", url)))
    }
}
