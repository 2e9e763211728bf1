//! IAM role ARN parsing
//!
//! `arn:partition:service:region:account:resource`. The account number always
//! sits at field index 4.

use std::fmt;

use crate::error::BotError;

const ACCOUNT_NUMBER_INDEX: usize = 4;

/// A role ARN whose account number field is known to exist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleArn {
    raw: String,
    account_number: String,
}

impl RoleArn {
    /// Parse a role ARN, rejecting anything with too few `:` fields
    pub fn parse(raw: &str) -> Result<Self, BotError> {
        let fields: Vec<&str> = raw.split(':').collect();
        let Some(account) = fields.get(ACCOUNT_NUMBER_INDEX) else {
            return Err(BotError::MalformedArn {
                arn: raw.to_string(),
                fields: fields.len(),
            });
        };

        Ok(Self {
            raw: raw.to_string(),
            account_number: account.to_string(),
        })
    }

    pub fn account_number(&self) -> &str {
        &self.account_number
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for RoleArn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Extract the AWS account number from a role ARN
pub fn account_number_from_role_arn(raw: &str) -> Result<String, BotError> {
    RoleArn::parse(raw).map(|arn| arn.account_number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_number_from_valid_arn() {
        let arn = "arn:aws:iam::123456789012:role/foo/bar/foo-bar-mysuperawesomerole";
        assert_eq!(account_number_from_role_arn(arn).unwrap(), "123456789012");
    }

    #[test]
    fn test_account_number_for_many_accounts() {
        for account in ["000000000000", "123456789012", "999999999999", "184475218016"] {
            let arn = format!("arn:aws:iam::{}:role/k8s/{}-role", account, account);
            let parsed = RoleArn::parse(&arn).unwrap();
            assert_eq!(parsed.account_number(), account);
            assert_eq!(parsed.as_str(), arn);
        }
    }

    #[test]
    fn test_malformed_arn_is_rejected() {
        let arn = "arn-aws-iam--123456789012-role/foo/bar/foo-bar-mysuperawesomerole";
        let err = account_number_from_role_arn(arn).unwrap_err();
        assert_eq!(
            err,
            BotError::MalformedArn {
                arn: arn.to_string(),
                fields: 1
            }
        );
    }

    #[test]
    fn test_four_fields_is_not_enough() {
        let err = RoleArn::parse("arn:aws:iam:").unwrap_err();
        assert!(matches!(err, BotError::MalformedArn { fields: 4, .. }));
    }

    #[test]
    fn test_five_fields_is_enough() {
        let arn = RoleArn::parse("arn:aws:iam::123456789012").unwrap();
        assert_eq!(arn.account_number(), "123456789012");
    }
}
