//! Request dispatcher
//!
//! Parses the chat command, runs it, and turns the outcome into reply text.
//! Failures are replies too; nothing here can stop the listener.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, info_span, warn, Instrument};

use crate::cluster::{grant_role, ClusterConfigClient, GrantOutcome};
use crate::config::{BotConfig, CommandGrammar};
use crate::error::BotError;
use crate::identity::IdentityResolver;
use crate::resolver::{ChainFailure, ResolutionChain};
use crate::slack::Message;

/// A parsed chat command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Resolve and list the role's owners
    Validate {
        namespace: String,
        role_arn: String,
        cluster: String,
    },
    /// Resolve owners and tell the requester who can approve
    Request {
        namespace: String,
        role_arn: String,
        cluster: String,
    },
    /// Authorize the requester and allow the role on the namespace
    Apply {
        namespace: String,
        role_arn: String,
        cluster: Option<String>,
    },
    Help,
}

impl Command {
    /// Parse space-delimited command text (mention already stripped)
    pub fn parse(text: &str, grammar: &CommandGrammar) -> Result<Self, BotError> {
        let parts: Vec<&str> = text.split_whitespace().collect();
        let malformed = |usage: String| BotError::MalformedCommand {
            usage,
            received: text.to_string(),
        };

        let Some((&keyword, args)) = parts.split_first() else {
            return Err(malformed(grammar.help_text()));
        };

        if keyword == grammar.validate {
            match args {
                [namespace, role_arn, cluster] => Ok(Command::Validate {
                    namespace: namespace.to_string(),
                    role_arn: role_arn.to_string(),
                    cluster: cluster.to_string(),
                }),
                _ => Err(malformed(grammar.validate_usage())),
            }
        } else if keyword == grammar.request {
            match args {
                [namespace, role_arn, cluster] => Ok(Command::Request {
                    namespace: namespace.to_string(),
                    role_arn: role_arn.to_string(),
                    cluster: cluster.to_string(),
                }),
                _ => Err(malformed(grammar.request_usage())),
            }
        } else if keyword == grammar.apply {
            match args {
                [namespace, role_arn] => Ok(Command::Apply {
                    namespace: namespace.to_string(),
                    role_arn: role_arn.to_string(),
                    cluster: None,
                }),
                [namespace, role_arn, cluster] => Ok(Command::Apply {
                    namespace: namespace.to_string(),
                    role_arn: role_arn.to_string(),
                    cluster: Some(cluster.to_string()),
                }),
                _ => Err(malformed(grammar.apply_usage())),
            }
        } else if keyword == grammar.help {
            Ok(Command::Help)
        } else {
            Err(malformed(grammar.help_text()))
        }
    }
}

/// Why an apply request stopped short of the grant
#[derive(Debug, Error)]
enum ApplyError {
    #[error(transparent)]
    Chain(#[from] ChainFailure),
    #[error(transparent)]
    Bot(#[from] BotError),
}

/// Drop a leading `<@BOTID>` mention
pub fn strip_mention(text: &str) -> &str {
    let trimmed = text.trim_start();
    if trimmed.starts_with("<@") {
        if let Some(end) = trimmed.find('>') {
            return trimmed[end + 1..].trim();
        }
    }
    trimmed.trim()
}

/// Routes commands to the resolution chain and the cluster
pub struct Dispatcher {
    grammar: CommandGrammar,
    chain: ResolutionChain,
    identity: Arc<dyn IdentityResolver>,
    cluster: Arc<dyn ClusterConfigClient>,
    allowed_roles_annotation: String,
    default_cluster: Option<String>,
}

impl Dispatcher {
    pub fn new(
        config: &BotConfig,
        chain: ResolutionChain,
        identity: Arc<dyn IdentityResolver>,
        cluster: Arc<dyn ClusterConfigClient>,
    ) -> Self {
        Self {
            grammar: config.grammar.clone(),
            chain,
            identity,
            cluster,
            allowed_roles_annotation: config.cluster.allowed_roles_annotation.clone(),
            default_cluster: config.cluster.default_cluster.clone(),
        }
    }

    /// Handle an addressed message and build the reply frame
    pub async fn reply(&self, msg: &Message) -> Message {
        let span = info_span!("command", user = %msg.user, channel = %msg.channel);
        let text = self
            .handle(strip_mention(&msg.text), &msg.user)
            .instrument(span)
            .await;
        Message::reply_to(msg.channel.clone(), text)
    }

    /// Run command text on behalf of a chat user; the result is the reply text
    pub async fn handle(&self, text: &str, chat_user: &str) -> String {
        info!(text = %text, "Processing request");
        let command = match Command::parse(text, &self.grammar) {
            Ok(command) => command,
            Err(e) => {
                warn!(error = %e, "Malformed request");
                return e.to_string();
            }
        };

        match command {
            Command::Validate { role_arn, .. } => match self.chain.resolve_owners(&role_arn).await {
                Ok(owners) => owners.joined(),
                Err(failure) => failure.to_string(),
            },
            Command::Request {
                namespace,
                role_arn,
                cluster,
            } => match self.chain.resolve_owners(&role_arn).await {
                Ok(owners) => format!(
                    "Request to allow pods in namespace={} on cluster={} to assume role={} must be approved by one of: {}",
                    namespace,
                    cluster,
                    role_arn,
                    owners.joined()
                ),
                Err(failure) => failure.to_string(),
            },
            Command::Apply {
                namespace,
                role_arn,
                cluster,
            } => self
                .apply(text, &namespace, &role_arn, cluster, chat_user)
                .await
                .unwrap_or_else(|e| e.to_string()),
            Command::Help => self.grammar.help_text(),
        }
    }

    /// Owner lookups, authorization, then the namespace grant
    async fn apply(
        &self,
        received: &str,
        namespace: &str,
        role_arn: &str,
        cluster: Option<String>,
        chat_user: &str,
    ) -> Result<String, ApplyError> {
        let cluster = cluster
            .or_else(|| self.default_cluster.clone())
            .ok_or_else(|| BotError::MalformedCommand {
                usage: self.grammar.apply_usage(),
                received: received.to_string(),
            })?;

        let owners = self.chain.resolve_owners(role_arn).await?;
        let requester = self.identity.resolve(chat_user).await?;
        let request = owners.authorize(namespace, &cluster, &requester)?;
        let outcome =
            grant_role(self.cluster.as_ref(), &self.allowed_roles_annotation, &request).await?;

        Ok(match outcome {
            GrantOutcome::Added => format!(
                "Allowing pods in namespace={} on cluster={} to assume role={}",
                namespace, cluster, role_arn
            ),
            GrantOutcome::AlreadyAllowed => format!(
                "Pods in namespace={} on cluster={} are already allowed to assume role={}",
                namespace, cluster, role_arn
            ),
        })
    }
}
