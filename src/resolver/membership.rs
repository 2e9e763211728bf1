//! AD group member-list lookup

use reqwest::Client;
use tracing::info;

use super::http::get_json;
use super::types::GroupMembership;
use crate::error::BotError;

/// Client for the AD group member-list service
#[derive(Clone)]
pub struct MembershipResolver {
    client: Client,
    base_url: String,
}

impl MembershipResolver {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn group_endpoint(&self, group: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(group)
        )
    }

    /// Fetch a group's membership
    pub async fn lookup_group(&self, group: &str) -> Result<GroupMembership, BotError> {
        let url = self.group_endpoint(group);
        let membership: GroupMembership = get_json(&self.client, &url, None).await?;

        info!(
            group = %group,
            members = membership.members.users.len(),
            "Resolved AD group members"
        );
        Ok(membership)
    }

    /// Member display names in service order
    pub async fn lookup_members(&self, group: &str) -> Result<Vec<String>, BotError> {
        self.lookup_group(group).await.map(|m| m.members.users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::http::build_client;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_members_keep_service_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/eng-admins"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "eng-admins",
                "description": "engineering admins",
                "members": {"groups": [], "users": ["Zed, Zoe", "Doe, John", "Doe, John", "Adams, Amy"]}
            })))
            .mount(&server)
            .await;

        let resolver = MembershipResolver::new(build_client(None).unwrap(), server.uri());
        let members = resolver.lookup_members("eng-admins").await.unwrap();
        assert_eq!(members, vec!["Zed, Zoe", "Doe, John", "Doe, John", "Adams, Amy"]);
    }

    #[tokio::test]
    async fn test_null_group_metadata_is_ignored() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/eng-admins"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "eng-admins",
                "description": null,
                "email": null,
                "members": {"groups": null, "users": ["Doe, John"]}
            })))
            .mount(&server)
            .await;

        let resolver = MembershipResolver::new(build_client(None).unwrap(), server.uri());
        assert_eq!(resolver.lookup_members("eng-admins").await.unwrap(), vec!["Doe, John"]);
    }

    #[tokio::test]
    async fn test_missing_members_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"name":"codeNinjas","description":"super awesome group","email":"codeninjas"#,
            ))
            .mount(&server)
            .await;

        let resolver = MembershipResolver::new(build_client(None).unwrap(), server.uri());
        let err = resolver.lookup_members("codeNinjas").await.unwrap_err();
        assert!(matches!(err, BotError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_server_error_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let resolver = MembershipResolver::new(build_client(None).unwrap(), server.uri());
        let err = resolver.lookup_members("ADMINS").await.unwrap_err();
        assert_eq!(
            err,
            BotError::Transport {
                url: format!("{}/ADMINS", server.uri()),
                reason: "httpStatusCode=503(503 Service Unavailable)".to_string(),
            }
        );
    }

    #[test]
    fn test_group_endpoint_encodes_spaces() {
        let resolver = MembershipResolver::new(build_client(None).unwrap(), "https://adgrp.example.com/");
        assert_eq!(
            resolver.group_endpoint("AWS Prod Admins"),
            "https://adgrp.example.com/AWS%20Prod%20Admins"
        );
    }
}
