//! Role-Ownership Resolution Chain
//!
//! Answers "who owns this AWS role?" with dependent lookups:
//!
//! ```text
//! ParseArn -> ResolveOwnerTeam -> ResolveSecurityGroup -> ResolveMembers -> Authorize -> Done
//!                 \___________________ any error ___________________________/ -> Failed
//! ```
//!
//! Each hop is one GET. Nothing is retried or cached; the first failure ends
//! the chain and its message becomes the reply text.

pub mod http;
pub mod membership;
pub mod owner;
pub mod types;

use std::fmt;

use reqwest::Client;
use thiserror::Error;
use tracing::{debug, warn};

use crate::arn::RoleArn;
use crate::config::BotConfig;
use crate::error::BotError;
use crate::identity::{is_requestor_owner, AuthorizedRequest, RequesterIdentity};

pub use membership::MembershipResolver;
pub use owner::OwnerResolver;

/// Position in the resolution chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ParseArn,
    ResolveOwnerTeam,
    ResolveSecurityGroup,
    ResolveMembers,
    Authorize,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::ParseArn => "parse-arn",
            Stage::ResolveOwnerTeam => "resolve-owner-team",
            Stage::ResolveSecurityGroup => "resolve-security-group",
            Stage::ResolveMembers => "resolve-members",
            Stage::Authorize => "authorize",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// The chain stopped before producing an owner list
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to get owners of awsRoleArn={role_arn}. err={source}")]
pub struct ChainFailure {
    /// Stage that failed
    pub stage: Stage,
    pub role_arn: String,
    pub source: BotError,
}

/// Everything learned about a role's ownership
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleOwners {
    pub role_arn: RoleArn,
    pub owner_team_id: i64,
    pub security_group: String,
    /// Member display names, in directory order
    pub members: Vec<String>,
}

impl RoleOwners {
    /// Members joined with ", " for chat replies
    pub fn joined(&self) -> String {
        self.members.join(", ")
    }

    /// Authorize stage: admit the requester only if they are a member
    pub fn authorize(
        &self,
        namespace: &str,
        cluster: &str,
        requester: &RequesterIdentity,
    ) -> Result<AuthorizedRequest, BotError> {
        debug!(stage = %Stage::Authorize, requester = %requester, "Authorizing requester");
        if !is_requestor_owner(requester, &self.members) {
            warn!(
                requester = %requester,
                role_arn = %self.role_arn,
                "Requester is not an owner"
            );
            return Err(BotError::NotAuthorized {
                requester: requester.display_name(),
                role_arn: self.role_arn.to_string(),
                owners: self.joined(),
            });
        }

        Ok(AuthorizedRequest::new(
            namespace,
            cluster,
            self.role_arn.clone(),
            requester.clone(),
        ))
    }
}

/// Runs the owner lookups in order
#[derive(Clone)]
pub struct ResolutionChain {
    owners: OwnerResolver,
    membership: MembershipResolver,
}

impl ResolutionChain {
    pub fn new(owners: OwnerResolver, membership: MembershipResolver) -> Self {
        Self { owners, membership }
    }

    pub fn from_config(config: &BotConfig, client: Client) -> Self {
        Self::new(
            OwnerResolver::new(
                client.clone(),
                config.metadata_server_url.clone(),
                config.api_key.clone(),
            ),
            MembershipResolver::new(client, config.ad_group_lookup_url.clone()),
        )
    }

    /// ParseArn through ResolveMembers
    pub async fn resolve_owners(&self, role_arn: &str) -> Result<RoleOwners, ChainFailure> {
        let fail = |stage: Stage, source: BotError| {
            warn!(stage = %stage, role_arn = %role_arn, error = %source, "Resolution chain failed");
            ChainFailure {
                stage,
                role_arn: role_arn.to_string(),
                source,
            }
        };

        debug!(stage = %Stage::ParseArn, role_arn = %role_arn);
        let arn = RoleArn::parse(role_arn).map_err(|e| fail(Stage::ParseArn, e))?;

        debug!(stage = %Stage::ResolveOwnerTeam, account = %arn.account_number());
        let owner_team_id = self
            .owners
            .lookup_account_owner(arn.account_number())
            .await
            .map_err(|e| fail(Stage::ResolveOwnerTeam, e))?;

        debug!(stage = %Stage::ResolveSecurityGroup, owner_team_id);
        let security_group = self
            .owners
            .lookup_security_group(owner_team_id)
            .await
            .map_err(|e| fail(Stage::ResolveSecurityGroup, e))?;

        debug!(stage = %Stage::ResolveMembers, group = %security_group);
        let members = self
            .membership
            .lookup_members(&security_group)
            .await
            .map_err(|e| fail(Stage::ResolveMembers, e))?;

        debug!(stage = %Stage::Done, role_arn = %role_arn);
        Ok(RoleOwners {
            role_arn: arn,
            owner_team_id,
            security_group,
            members,
        })
    }
}
