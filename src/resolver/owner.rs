//! Account-ownership lookups
//!
//! account number -> owning team id -> AD security group, both against the
//! metadata service with the static API key.

use reqwest::Client;
use tracing::{debug, info};

use super::http::get_json;
use super::types::{AccountOwnerRecord, DataEnvelope, SecurityGroupRecord};
use crate::error::BotError;

/// Client for the account/team metadata service
#[derive(Clone)]
pub struct OwnerResolver {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OwnerResolver {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    pub fn account_owner_endpoint(&self, account_number: &str) -> String {
        format!(
            "{}/accounts?AccountNumber={}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(account_number)
        )
    }

    pub fn security_group_endpoint(&self, owner_team_id: i64) -> String {
        format!("{}/teams?ID={}", self.base_url.trim_end_matches('/'), owner_team_id)
    }

    /// Resolve the team that owns an AWS account
    pub async fn lookup_account_owner(&self, account_number: &str) -> Result<i64, BotError> {
        let url = self.account_owner_endpoint(account_number);
        debug!(account_number = %account_number, "Looking up account owner");

        let envelope: DataEnvelope<AccountOwnerRecord> =
            get_json(&self.client, &url, Some(&self.api_key)).await?;
        let record = first_record(envelope, &url)?;

        info!(
            account_number = %account_number,
            owner_team_id = record.owner_team_id,
            "Resolved account owner"
        );
        Ok(record.owner_team_id)
    }

    /// Resolve the AD security group of an owner team
    pub async fn lookup_security_group(&self, owner_team_id: i64) -> Result<String, BotError> {
        let url = self.security_group_endpoint(owner_team_id);
        debug!(owner_team_id, "Looking up AD security group");

        let envelope: DataEnvelope<SecurityGroupRecord> =
            get_json(&self.client, &url, Some(&self.api_key)).await?;
        let record = first_record(envelope, &url)?;

        info!(
            owner_team_id,
            group = %record.ad_security_group,
            "Resolved AD security group"
        );
        Ok(record.ad_security_group)
    }
}

fn first_record<T>(envelope: DataEnvelope<T>, url: &str) -> Result<T, BotError> {
    envelope
        .data
        .into_iter()
        .next()
        .ok_or_else(|| BotError::EmptyResult {
            url: url.to_string(),
        })
}
