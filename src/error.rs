//! Error types for the kube2iam bot
//!
//! Every variant renders as operator-facing text: the `Display` output of a
//! failed command is exactly what gets posted back to the chat channel.

use thiserror::Error;

/// Errors that can occur while handling a bot command
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BotError {
    /// Role ARN does not have the `arn:partition:service:region:account:resource` shape
    #[error("malformed role ARN `{arn}`: expected at least 5 ':'-delimited fields, found {fields}")]
    MalformedArn { arn: String, fields: usize },

    /// Network failure or non-200 status from a remote lookup
    #[error("request to url={url} failed, err={reason}")]
    Transport { url: String, reason: String },

    /// Response body was not the JSON shape we expected
    #[error("failed to parse response from url={url}, err={reason}")]
    Decode { url: String, reason: String },

    /// Well-formed response with zero records
    #[error("no records returned from url={url}")]
    EmptyResult { url: String },

    /// Requester is not in the resolved owner list
    #[error("{requester} is not an owner of awsRoleArn={role_arn}. Owners are [{owners}]")]
    NotAuthorized {
        requester: String,
        role_arn: String,
        owners: String,
    },

    /// Chat text does not match the command grammar
    #[error("ERROR:\n Request should be of the form \n {usage} Order is important. Received ```{received}```")]
    MalformedCommand { usage: String, received: String },

    /// Requester's chat identity could not be resolved
    #[error("failed to resolve identity of chat user={user}, err={reason}")]
    Identity { user: String, reason: String },

    /// kubectl / Kubernetes API failure or bad annotation contents
    #[error("cluster operation `{operation}` on cluster={cluster} failed, err={reason}")]
    Cluster {
        operation: String,
        cluster: String,
        reason: String,
    },

    /// Chat transport bootstrap or frame error
    #[error("chat transport error: {0}")]
    Chat(String),
}

impl BotError {
    pub(crate) fn cluster(
        operation: impl Into<String>,
        cluster: impl Into<String>,
        reason: impl std::fmt::Display,
    ) -> Self {
        BotError::Cluster {
            operation: operation.into(),
            cluster: cluster.into(),
            reason: reason.to_string(),
        }
    }
}
