//! Namespace mutation
//!
//! The dispatcher only sees [`ClusterConfigClient`]. Two backends implement
//! it: one shells out to `kubectl`, the other calls the Kubernetes API.
//!
//! Grants are read-modify-write against the live namespace with no locking;
//! two grants racing on one namespace can lose an update.

pub mod annotations;
pub mod kube_api;
pub mod kubectl;

use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use tracing::info;

use crate::config::{ClusterAccess, ClusterBackend};
use crate::error::BotError;
use crate::identity::AuthorizedRequest;

pub use kube_api::KubeApiClient;
pub use kubectl::KubectlClient;

/// Read and write namespace definitions on a named cluster
#[async_trait]
pub trait ClusterConfigClient: Send + Sync {
    async fn read_namespace(&self, cluster: &str, name: &str) -> Result<Namespace, BotError>;

    async fn apply_namespace(&self, cluster: &str, namespace: &Namespace) -> Result<(), BotError>;
}

/// Build the backend selected in the config
pub fn from_access(access: &ClusterAccess) -> Arc<dyn ClusterConfigClient> {
    match access.backend {
        ClusterBackend::Kubectl => Arc::new(KubectlClient::new(
            access.kubeconfig.clone(),
            access.user_suffix.clone(),
        )),
        ClusterBackend::Api => Arc::new(KubeApiClient::new(
            access.kubeconfig.clone(),
            access.user_suffix.clone(),
        )),
    }
}

/// What a grant did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantOutcome {
    Added,
    AlreadyAllowed,
}

/// Kubeconfig user for a cluster: `<cluster><suffix>`
pub fn context_user(cluster: &str, user_suffix: &str) -> String {
    format!("{}{}", cluster, user_suffix)
}

/// Allow the request's role on its namespace
///
/// The namespace is only written back when the role list actually changes.
pub async fn grant_role(
    client: &dyn ClusterConfigClient,
    annotation: &str,
    request: &AuthorizedRequest,
) -> Result<GrantOutcome, BotError> {
    let cluster = request.cluster();
    let namespace = client.read_namespace(cluster, request.namespace()).await?;

    let (updated, changed) =
        annotations::with_allowed_role(namespace, annotation, request.role_arn().as_str())
            .map_err(|e| {
                BotError::cluster(
                    "merge-annotation",
                    cluster,
                    format!("annotation {} is not a JSON list of roles: {}", annotation, e),
                )
            })?;

    if !changed {
        info!(
            cluster = %cluster,
            namespace = %request.namespace(),
            role_arn = %request.role_arn(),
            "Role already allowed"
        );
        return Ok(GrantOutcome::AlreadyAllowed);
    }

    client.apply_namespace(cluster, &updated).await?;
    info!(
        cluster = %cluster,
        namespace = %request.namespace(),
        role_arn = %request.role_arn(),
        requester = %request.requester(),
        "Allowed role on namespace"
    );
    Ok(GrantOutcome::Added)
}
