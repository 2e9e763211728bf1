//! Kubernetes API backend
//!
//! Same context/user selection as the kubectl backend, but talks to the API
//! server with `kube`. Writes are a `replace` carrying the resourceVersion we
//! read, so a concurrent edit fails the write instead of being overwritten.

use std::path::PathBuf;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use kube::api::PostParams;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
use tracing::debug;

use super::{context_user, ClusterConfigClient};
use crate::error::BotError;

pub struct KubeApiClient {
    kubeconfig: Option<PathBuf>,
    user_suffix: String,
}

impl KubeApiClient {
    pub fn new(kubeconfig: Option<PathBuf>, user_suffix: impl Into<String>) -> Self {
        Self {
            kubeconfig,
            user_suffix: user_suffix.into(),
        }
    }

    pub fn options_for(&self, cluster: &str) -> KubeConfigOptions {
        KubeConfigOptions {
            context: Some(cluster.to_string()),
            cluster: None,
            user: Some(context_user(cluster, &self.user_suffix)),
        }
    }

    async fn namespaces(&self, operation: &str, cluster: &str) -> Result<Api<Namespace>, BotError> {
        let kubeconfig = match &self.kubeconfig {
            Some(path) => Kubeconfig::read_from(path),
            None => Kubeconfig::read(),
        }
        .map_err(|e| BotError::cluster(operation, cluster, format!("failed to load kubeconfig: {}", e)))?;

        let config = Config::from_custom_kubeconfig(kubeconfig, &self.options_for(cluster))
            .await
            .map_err(|e| BotError::cluster(operation, cluster, e))?;
        debug!(cluster = %cluster, server = %config.cluster_url, "Using Kubernetes API");

        let client = Client::try_from(config).map_err(|e| BotError::cluster(operation, cluster, e))?;
        Ok(Api::all(client))
    }
}

#[async_trait]
impl ClusterConfigClient for KubeApiClient {
    async fn read_namespace(&self, cluster: &str, name: &str) -> Result<Namespace, BotError> {
        let api = self.namespaces("read-namespace", cluster).await?;
        api.get(name)
            .await
            .map_err(|e| BotError::cluster("read-namespace", cluster, e))
    }

    async fn apply_namespace(&self, cluster: &str, namespace: &Namespace) -> Result<(), BotError> {
        let name = namespace
            .metadata
            .name
            .as_deref()
            .ok_or_else(|| BotError::cluster("apply-namespace", cluster, "namespace has no name"))?;

        let api = self.namespaces("apply-namespace", cluster).await?;
        api.replace(name, &PostParams::default(), namespace)
            .await
            .map_err(|e| BotError::cluster("apply-namespace", cluster, e))?;
        Ok(())
    }
}
