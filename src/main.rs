//! kube2iam bot
//!
//! Listens on Slack RTM for commands addressed to the bot, resolves the
//! owners of an AWS IAM role, and lets those owners allow a namespace to
//! assume the role through kube2iam.
//!
//! # Usage
//! ```bash
//! kube2iam-bot \
//!   --slack-token xoxb-... \
//!   --metadata-server-url https://mds.example.com/dev_read \
//!   --api-key ... \
//!   --ad-group-lookup-url https://ad.example.com/api/v1/groups \
//!   --default-cluster hydrogen
//! ```
//!
//! In chat:
//! ```text
//! @kube2iam validateKube2iam <namespace> <roleArn> <cluster>
//! @kube2iam applyKube2iam <namespace> <roleArn> [cluster]
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use kube2iam_bot::cluster;
use kube2iam_bot::config::{
    BotConfig, ClusterAccess, ClusterBackend, CommandGrammar, SlackConfig,
    DEFAULT_ALLOWED_ROLES_ANNOTATION,
};
use kube2iam_bot::dispatcher::Dispatcher;
use kube2iam_bot::identity::DirectoryIdentityResolver;
use kube2iam_bot::resolver::http::build_client;
use kube2iam_bot::resolver::ResolutionChain;
use kube2iam_bot::slack::{RtmSession, SlackWebClient};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

// ============================================================
// CLI Definition
// ============================================================

#[derive(Parser)]
#[command(name = "kube2iam-bot")]
#[command(about = "Slack bot for kube2iam role ownership and namespace grants", long_about = None)]
#[command(version)]
struct Cli {
    /// Slack bot integration token
    #[arg(long, env = "SLACK_BOT_TOKEN", hide_env_values = true)]
    slack_token: String,

    /// Base URL of the AWS metadata server
    #[arg(long, env = "AWS_METADATA_SERVER_URL")]
    metadata_server_url: String,

    /// API key sent to the metadata server
    #[arg(long, env = "AWS_METADATA_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Base URL of the AD group membership service
    #[arg(long, env = "AD_GROUP_LOOKUP_URL")]
    ad_group_lookup_url: String,

    /// Base URL of the AD user lookup service
    #[arg(long, env = "AD_USER_LOOKUP_URL")]
    ad_user_lookup_url: Option<String>,

    /// Kubeconfig with one context per cluster
    #[arg(long, env = "KUBECONFIG")]
    kubeconfig: Option<PathBuf>,

    /// Cluster used when a command does not name one
    #[arg(long)]
    default_cluster: Option<String>,

    /// How namespaces are read and written
    #[arg(long, value_enum, default_value_t = ClusterBackend::Kubectl)]
    cluster_backend: ClusterBackend,

    /// Appended to the cluster name to pick the kubeconfig user
    #[arg(long, default_value = "_sudo")]
    kube_user_suffix: String,

    /// Namespace annotation holding the allowed role list
    #[arg(long, default_value = DEFAULT_ALLOWED_ROLES_ANNOTATION)]
    allowed_roles_annotation: String,

    /// Timeout for metadata and directory requests (seconds)
    #[arg(long)]
    http_timeout_secs: Option<u64>,

    /// Slack RTM connect endpoint
    #[arg(long, default_value = "https://slack.com/api/rtm.connect")]
    rtm_connect_url: String,

    /// Slack Web API base URL
    #[arg(long, default_value = "https://slack.com/api")]
    slack_api_url: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn into_config(self) -> BotConfig {
        BotConfig {
            metadata_server_url: self.metadata_server_url,
            api_key: self.api_key,
            ad_group_lookup_url: self.ad_group_lookup_url,
            ad_user_lookup_url: self.ad_user_lookup_url,
            slack: SlackConfig {
                token: self.slack_token,
                rtm_connect_url: self.rtm_connect_url,
                api_url: self.slack_api_url,
            },
            cluster: ClusterAccess {
                backend: self.cluster_backend,
                kubeconfig: self.kubeconfig,
                user_suffix: self.kube_user_suffix,
                default_cluster: self.default_cluster,
                allowed_roles_annotation: self.allowed_roles_annotation,
            },
            grammar: CommandGrammar::default(),
            http_timeout: self.http_timeout_secs.map(Duration::from_secs),
        }
    }
}

fn init_logging(verbose: bool, json: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

// ============================================================
// Main Entry Point
// ============================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs);

    let config = cli.into_config();
    info!(
        metadata_server = %config.metadata_server_url,
        ad_group_lookup = %config.ad_group_lookup_url,
        backend = %config.cluster.backend,
        default_cluster = ?config.cluster.default_cluster,
        "Starting kube2iam bot"
    );

    let http = build_client(config.http_timeout).context("Failed to build HTTP client")?;
    let slack = SlackWebClient::new(http.clone(), &config.slack.api_url, &config.slack.token);

    let chain = ResolutionChain::from_config(&config, http.clone());
    let identity = Arc::new(DirectoryIdentityResolver::new(
        slack.clone(),
        http,
        config.ad_user_lookup_url.clone(),
    ));
    let cluster = cluster::from_access(&config.cluster);
    let dispatcher = Arc::new(Dispatcher::new(&config, chain, identity, cluster));

    loop {
        let session = match RtmSession::connect(&slack, &config.slack.rtm_connect_url).await {
            Ok(session) => session,
            Err(e) => {
                error!(error = %e, "Failed to start Slack RTM session");
                tokio::time::sleep(RECONNECT_DELAY).await;
                continue;
            }
        };

        if let Err(e) = session.run(Arc::clone(&dispatcher)).await {
            warn!(error = %e, "Slack RTM session ended, reconnecting");
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}
