//! Bot configuration
//!
//! Everything the bot needs to reach its collaborators, built once at startup
//! and handed to constructors. No endpoint or grammar string lives in a global.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default annotation holding the JSON list of roles a namespace may assume
pub const DEFAULT_ALLOWED_ROLES_ANNOTATION: &str = "iam.amazonaws.com/allowed-roles";

/// Top-level bot configuration
#[derive(Clone)]
pub struct BotConfig {
    /// Base URL of the account-ownership/teams metadata service
    pub metadata_server_url: String,
    /// Value sent in the `X-Api-Key` header to the metadata service
    pub api_key: String,
    /// Base URL of the AD group member-list service
    pub ad_group_lookup_url: String,
    /// Base URL of the AD user lookup service, if requester names should be confirmed there
    pub ad_user_lookup_url: Option<String>,
    pub slack: SlackConfig,
    pub cluster: ClusterAccess,
    pub grammar: CommandGrammar,
    /// Per-request HTTP timeout; `None` keeps the transport default
    pub http_timeout: Option<Duration>,
}

impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("metadata_server_url", &self.metadata_server_url)
            .field("api_key", &"<redacted>")
            .field("ad_group_lookup_url", &self.ad_group_lookup_url)
            .field("ad_user_lookup_url", &self.ad_user_lookup_url)
            .field("slack", &self.slack)
            .field("cluster", &self.cluster)
            .field("grammar", &self.grammar)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

/// Slack connection settings
#[derive(Clone)]
pub struct SlackConfig {
    pub token: String,
    /// `rtm.connect` endpoint
    pub rtm_connect_url: String,
    /// Web API base, used for `users.info`
    pub api_url: String,
}

impl fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlackConfig")
            .field("token", &"<redacted>")
            .field("rtm_connect_url", &self.rtm_connect_url)
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Which implementation mutates namespaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ClusterBackend {
    /// Shell out to `kubectl`
    #[default]
    Kubectl,
    /// Talk to the Kubernetes API directly
    Api,
}

impl fmt::Display for ClusterBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterBackend::Kubectl => write!(f, "kubectl"),
            ClusterBackend::Api => write!(f, "api"),
        }
    }
}

/// How to reach the clusters whose namespaces get annotated
#[derive(Debug, Clone)]
pub struct ClusterAccess {
    pub backend: ClusterBackend,
    /// Kubeconfig holding one context per cluster name
    pub kubeconfig: Option<PathBuf>,
    /// Appended to the cluster name to pick the kubeconfig user (`<cluster>_sudo`)
    pub user_suffix: String,
    /// Cluster used when `applyKube2iam` omits one
    pub default_cluster: Option<String>,
    pub allowed_roles_annotation: String,
}

impl Default for ClusterAccess {
    fn default() -> Self {
        Self {
            backend: ClusterBackend::Kubectl,
            kubeconfig: None,
            user_suffix: "_sudo".to_string(),
            default_cluster: None,
            allowed_roles_annotation: DEFAULT_ALLOWED_ROLES_ANNOTATION.to_string(),
        }
    }
}

/// Command keywords recognised in chat text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandGrammar {
    pub validate: String,
    pub apply: String,
    pub request: String,
    pub help: String,
}

impl Default for CommandGrammar {
    fn default() -> Self {
        Self {
            validate: "validateKube2iam".to_string(),
            apply: "applyKube2iam".to_string(),
            request: "requestKube2iam".to_string(),
            help: "help".to_string(),
        }
    }
}

impl CommandGrammar {
    pub fn validate_usage(&self) -> String {
        format!("```{} <namespace> <roleArn> <cluster>```", self.validate)
    }

    pub fn apply_usage(&self) -> String {
        format!("```{} <namespace> <roleArn> [cluster]```", self.apply)
    }

    pub fn request_usage(&self) -> String {
        format!("```{} <namespace> <roleArn> <cluster>```", self.request)
    }

    pub fn help_usage(&self) -> String {
        format!("```{}```", self.help)
    }

    /// Usage lines for every command
    pub fn help_text(&self) -> String {
        format!(
            "Supported requests:\n{}\n{}\n{}\n{}",
            self.validate_usage(),
            self.request_usage(),
            self.apply_usage(),
            self.help_usage()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_grammar_usage() {
        let grammar = CommandGrammar::default();
        assert_eq!(
            grammar.validate_usage(),
            "```validateKube2iam <namespace> <roleArn> <cluster>```"
        );
        assert!(grammar.help_text().contains("applyKube2iam <namespace> <roleArn> [cluster]"));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = BotConfig {
            metadata_server_url: "https://mds.example.com/dev_read".to_string(),
            api_key: "supersecret".to_string(),
            ad_group_lookup_url: "https://adgrp.example.com".to_string(),
            ad_user_lookup_url: None,
            slack: SlackConfig {
                token: "xoxb-secret".to_string(),
                rtm_connect_url: "https://slack.com/api/rtm.connect".to_string(),
                api_url: "https://slack.com/api".to_string(),
            },
            cluster: ClusterAccess::default(),
            grammar: CommandGrammar::default(),
            http_timeout: None,
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("supersecret"));
        assert!(!rendered.contains("xoxb-secret"));
        assert!(rendered.contains("mds.example.com"));
    }
}
