//! Response shapes of the three remote lookups
//!
//! Each service gets its own type so each resolver's contract can be tested
//! in isolation. Only the fields the chain consumes are required; the rest
//! are kept for diagnostics and may be absent or null.

use serde::Deserialize;

/// `{"data": [...]}` wrapper used by the metadata service
#[derive(Debug, Clone, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: Vec<T>,
}

/// One row of `/accounts?AccountNumber=<n>`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccountOwnerRecord {
    #[serde(rename = "OwnerTeamId")]
    pub owner_team_id: i64,
    #[serde(rename = "AccountNumber", default)]
    pub account_number: Option<String>,
    #[serde(rename = "AccountName", default)]
    pub account_name: Option<String>,
    #[serde(rename = "EnvironmentId", default)]
    pub environment_id: Option<i64>,
    #[serde(rename = "GUID", default)]
    pub guid: Option<i64>,
    #[serde(rename = "RequesterPersonId", default)]
    pub requester_person_id: Option<i64>,
    #[serde(rename = "ClaimRule", default)]
    pub claim_rule: Option<String>,
    #[serde(rename = "Size", default)]
    pub size: Option<String>,
}

/// One row of `/teams?ID=<id>`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SecurityGroupRecord {
    #[serde(rename = "ADSecurityGroup")]
    pub ad_security_group: String,
    #[serde(rename = "ID", default)]
    pub id: Option<i64>,
    #[serde(rename = "Name", default)]
    pub name: Option<String>,
    #[serde(rename = "OrgName", default)]
    pub org_name: Option<String>,
    #[serde(rename = "Director", default)]
    pub director: Option<i64>,
    #[serde(rename = "CostCenter", default)]
    pub cost_center: Option<i64>,
    #[serde(rename = "EmailDistList", default)]
    pub email_dist_list: Option<String>,
}

/// Body of `<ad-group-lookup>/<group>`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GroupMembership {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(rename = "type", default)]
    pub group_type: Option<String>,
    pub members: GroupMembers,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GroupMembers {
    /// Display names, typically "Last, First", in service order
    pub users: Vec<String>,
    #[serde(default)]
    pub groups: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_owner_record_decodes() {
        let raw = r#"{"data": [{"EnvironmentId": 7, "OwnerTeamId": 11, "GUID": 11534399, "AccountNumber": "123456789012", "AccountName": "unittest", "RequesterPersonId": 10, "ClaimRule": "@RuleName = \"Role mapping for unittest Account\"", "Size": "TEAMXL"}]}"#;
        let envelope: DataEnvelope<AccountOwnerRecord> = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.data.len(), 1);
        let record = &envelope.data[0];
        assert_eq!(record.owner_team_id, 11);
        assert_eq!(record.environment_id, Some(7));
        assert_eq!(record.guid, Some(11534399));
        assert_eq!(record.account_number.as_deref(), Some("123456789012"));
        assert_eq!(record.account_name.as_deref(), Some("unittest"));
        assert_eq!(record.requester_person_id, Some(10));
        assert_eq!(record.size.as_deref(), Some("TEAMXL"));
    }

    #[test]
    fn test_truncated_account_owner_fails() {
        let raw = r#"{"data": [{"EnvironmentId": 7, "OwnerTeamId": 11, "ClaimRule":"#;
        assert!(serde_json::from_str::<DataEnvelope<AccountOwnerRecord>>(raw).is_err());
    }

    #[test]
    fn test_security_group_record_decodes() {
        let raw = r#"{"data": [{"Name": "ut", "OrgName": "unit test", "ADSecurityGroup": "unittestAdmins", "ID": 11, "Director": 123, "CostCenter": 12345, "EmailDistList": "unit@test.com"}]}"#;
        let envelope: DataEnvelope<SecurityGroupRecord> = serde_json::from_str(raw).unwrap();
        let record = &envelope.data[0];
        assert_eq!(record.ad_security_group, "unittestAdmins");
        assert_eq!(record.cost_center, Some(12345));
        assert_eq!(record.director, Some(123));
        assert_eq!(record.email_dist_list.as_deref(), Some("unit@test.com"));
        assert_eq!(record.id, Some(11));
        assert_eq!(record.name.as_deref(), Some("ut"));
        assert_eq!(record.org_name.as_deref(), Some("unit test"));
    }

    #[test]
    fn test_group_membership_decodes() {
        let raw = r#"{"name":"codeNinjas","description":"super awesome group","email":"codeninjas@ninjaing.com","type":"unittest","updated":"2017-08-28T17:24:46.000Z","members":{"groups":[],"users":["ninja1","ninja2","ninja3","ninja4","ninja5"]},"managedBy":{"group":null,"user":"ninjaLeader"},"groups":["Ninja-Team1","Ninja-Team2","Ninja-Team3"]}"#;
        let membership: GroupMembership = serde_json::from_str(raw).unwrap();
        assert_eq!(membership.name.as_deref(), Some("codeNinjas"));
        assert_eq!(membership.description.as_deref(), Some("super awesome group"));
        assert_eq!(membership.email.as_deref(), Some("codeninjas@ninjaing.com"));
        assert_eq!(membership.group_type.as_deref(), Some("unittest"));
        assert_eq!(
            membership.members.users.join(","),
            "ninja1,ninja2,ninja3,ninja4,ninja5"
        );
    }

    #[test]
    fn test_null_auxiliary_fields_decode() {
        let raw = r#"{"data": [{"OwnerTeamId": 11, "AccountNumber": null, "ClaimRule": null, "Size": null}]}"#;
        let envelope: DataEnvelope<AccountOwnerRecord> = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.data[0].owner_team_id, 11);
        assert!(envelope.data[0].size.is_none());

        let raw = r#"{"name": null, "type": null, "members": {"users": ["ninja1"], "groups": null}}"#;
        let membership: GroupMembership = serde_json::from_str(raw).unwrap();
        assert_eq!(membership.members.users, vec!["ninja1".to_string()]);
        assert!(membership.members.groups.is_none());
    }

    #[test]
    fn test_missing_data_key_fails() {
        assert!(serde_json::from_str::<DataEnvelope<SecurityGroupRecord>>(r#"{"rows": []}"#).is_err());
    }
}
