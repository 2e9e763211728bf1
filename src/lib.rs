//! kube2iam bot library
//!
//! Resolves who owns an AWS IAM role (account, owner team, AD security group,
//! group members) and, for authorized requesters, allows a Kubernetes
//! namespace to assume that role through its kube2iam annotation.

pub mod arn;
pub mod cluster;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod identity;
pub mod resolver;
pub mod slack;

pub use arn::RoleArn;
pub use config::BotConfig;
pub use dispatcher::Dispatcher;
pub use error::BotError;
pub use resolver::{ChainFailure, ResolutionChain, RoleOwners};
