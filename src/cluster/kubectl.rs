//! `kubectl` backend
//!
//! Runs `kubectl --user <cluster><suffix> --context=<cluster> --kubeconfig=<path>`
//! for every call. Writes go through a scratch file and `kubectl apply -f`.

use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use tokio::process::Command;
use tracing::{debug, error};

use super::{context_user, ClusterConfigClient};
use crate::error::BotError;

/// Shells out to kubectl
pub struct KubectlClient {
    /// Program and any leading arguments, normally just `kubectl`
    command: Vec<String>,
    kubeconfig: Option<PathBuf>,
    user_suffix: String,
}

impl KubectlClient {
    pub fn new(kubeconfig: Option<PathBuf>, user_suffix: impl Into<String>) -> Self {
        Self {
            command: vec!["kubectl".to_string()],
            kubeconfig,
            user_suffix: user_suffix.into(),
        }
    }

    /// Use a different kubectl invocation, e.g. an absolute path
    pub fn with_command(mut self, command: Vec<String>) -> Self {
        self.command = command;
        self
    }

    /// Arguments selecting the cluster's context and privileged user
    pub fn base_args(&self, cluster: &str) -> Vec<String> {
        let mut args = vec![
            "--user".to_string(),
            context_user(cluster, &self.user_suffix),
            format!("--context={}", cluster),
        ];
        if let Some(path) = &self.kubeconfig {
            args.push(format!("--kubeconfig={}", path.display()));
        }
        args
    }

    async fn run(&self, operation: &str, cluster: &str, args: &[String]) -> Result<Vec<u8>, BotError> {
        let (program, leading) = self
            .command
            .split_first()
            .ok_or_else(|| BotError::cluster(operation, cluster, "empty kubectl command"))?;

        let mut full_args: Vec<String> = leading.to_vec();
        full_args.extend(self.base_args(cluster));
        full_args.extend_from_slice(args);
        debug!(program = %program, args = ?full_args, "Running kubectl");

        let output = Command::new(program)
            .args(&full_args)
            .output()
            .await
            .map_err(|e| BotError::cluster(operation, cluster, format!("failed to run {}: {}", program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!(cluster = %cluster, operation = %operation, stderr = %stderr, "kubectl failed");
            return Err(BotError::cluster(
                operation,
                cluster,
                format!("{} ({})", stderr, output.status),
            ));
        }

        Ok(output.stdout)
    }
}

/// Drop server-populated fields so the definition can be re-applied
pub fn exportable(mut namespace: Namespace) -> Namespace {
    let meta = &mut namespace.metadata;
    meta.resource_version = None;
    meta.uid = None;
    meta.creation_timestamp = None;
    meta.managed_fields = None;
    meta.self_link = None;
    meta.generation = None;
    namespace.status = None;
    namespace
}

#[async_trait]
impl ClusterConfigClient for KubectlClient {
    async fn read_namespace(&self, cluster: &str, name: &str) -> Result<Namespace, BotError> {
        let args = vec![
            "get".to_string(),
            "namespace".to_string(),
            name.to_string(),
            "-o".to_string(),
            "json".to_string(),
        ];
        let stdout = self.run("read-namespace", cluster, &args).await?;

        serde_json::from_slice(&stdout).map_err(|e| {
            BotError::cluster("read-namespace", cluster, format!("invalid namespace JSON: {}", e))
        })
    }

    async fn apply_namespace(&self, cluster: &str, namespace: &Namespace) -> Result<(), BotError> {
        let name = namespace.metadata.name.clone().unwrap_or_default();
        let definition = serde_json::to_vec(&exportable(namespace.clone()))
            .map_err(|e| BotError::cluster("apply-namespace", cluster, e))?;

        let mut scratch = tempfile::Builder::new()
            .prefix(&format!("{}.kube2iam-bot.ns-md.", name))
            .suffix(".json")
            .tempfile()
            .map_err(|e| BotError::cluster("apply-namespace", cluster, e))?;
        scratch
            .write_all(&definition)
            .and_then(|_| scratch.flush())
            .map_err(|e| BotError::cluster("apply-namespace", cluster, e))?;

        let args = vec![
            "apply".to_string(),
            "-f".to_string(),
            scratch.path().display().to_string(),
        ];
        self.run("apply-namespace", cluster, &args).await?;
        Ok(())
    }
}
