//! Requester identity and the owner check
//!
//! The directory hands back display names as "Last, First". A requester is an
//! owner when that exact string, compared case-insensitively, is in the member
//! list. There is no fuzzy matching.

use std::fmt;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::arn::RoleArn;
use crate::error::BotError;
use crate::resolver::http::get_json;
use crate::slack::SlackWebClient;

/// The person asking the bot to do something
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequesterIdentity {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl RequesterIdentity {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
        }
    }

    /// "Last, First", the form the directory uses
    pub fn display_name(&self) -> String {
        format!("{}, {}", self.last_name, self.first_name)
    }
}

impl fmt::Display for RequesterIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.display_name(), self.email)
    }
}

/// Is the requester one of `owners`?
pub fn is_requestor_owner(requester: &RequesterIdentity, owners: &[String]) -> bool {
    let wanted = requester.display_name().to_lowercase();
    owners.iter().any(|owner| owner.to_lowercase() == wanted)
}

/// A request that passed the owner check. Only `RoleOwners::authorize` builds one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedRequest {
    namespace: String,
    cluster: String,
    role_arn: RoleArn,
    requester: RequesterIdentity,
}

impl AuthorizedRequest {
    pub(crate) fn new(
        namespace: &str,
        cluster: &str,
        role_arn: RoleArn,
        requester: RequesterIdentity,
    ) -> Self {
        Self {
            namespace: namespace.to_string(),
            cluster: cluster.to_string(),
            role_arn,
            requester,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub fn role_arn(&self) -> &RoleArn {
        &self.role_arn
    }

    pub fn requester(&self) -> &RequesterIdentity {
        &self.requester
    }
}

/// Turns a chat user id into a requester identity
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, chat_user: &str) -> Result<RequesterIdentity, BotError>;
}

/// Directory record returned by the AD user lookup service
#[derive(Debug, Clone, Deserialize)]
struct DirectoryUser {
    #[serde(rename = "firstName")]
    first_name: String,
    #[serde(rename = "lastName")]
    last_name: String,
    #[serde(default)]
    email: String,
}

/// `<base>/<lowercase(percent-encoded "Last, First")>`
pub fn ad_user_lookup_endpoint(first_name: &str, last_name: &str, base_url: &str) -> String {
    let common_name = format!("{}, {}", last_name, first_name);
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(&common_name).to_lowercase()
    )
}

/// Resolves requesters from their Slack profile, optionally confirmed against AD
pub struct DirectoryIdentityResolver {
    slack: SlackWebClient,
    http_client: Client,
    ad_user_lookup_url: Option<String>,
}

impl DirectoryIdentityResolver {
    pub fn new(slack: SlackWebClient, http_client: Client, ad_user_lookup_url: Option<String>) -> Self {
        Self {
            slack,
            http_client,
            ad_user_lookup_url,
        }
    }

    async fn confirm_in_directory(
        &self,
        base_url: &str,
        chat_user: &str,
        profile: RequesterIdentity,
    ) -> Result<RequesterIdentity, BotError> {
        let url = ad_user_lookup_endpoint(&profile.first_name, &profile.last_name, base_url);
        let user: DirectoryUser = get_json(&self.http_client, &url, None).await?;

        if !user.email.eq_ignore_ascii_case(&profile.email) {
            return Err(BotError::Identity {
                user: chat_user.to_string(),
                reason: format!(
                    "directory entry at url={} has email={}, chat profile has email={}",
                    url, user.email, profile.email
                ),
            });
        }

        Ok(RequesterIdentity::new(user.first_name, user.last_name, user.email))
    }
}

#[async_trait]
impl IdentityResolver for DirectoryIdentityResolver {
    async fn resolve(&self, chat_user: &str) -> Result<RequesterIdentity, BotError> {
        let profile = self
            .slack
            .user_profile(chat_user)
            .await
            .map_err(|e| BotError::Identity {
                user: chat_user.to_string(),
                reason: e.to_string(),
            })?;
        let identity = RequesterIdentity::new(profile.first_name, profile.last_name, profile.email);
        debug!(chat_user = %chat_user, identity = %identity, "Resolved chat profile");

        let identity = match &self.ad_user_lookup_url {
            Some(base) => self.confirm_in_directory(base, chat_user, identity).await?,
            None => identity,
        };

        info!(chat_user = %chat_user, identity = %identity, "Resolved requester");
        Ok(identity)
    }
}
