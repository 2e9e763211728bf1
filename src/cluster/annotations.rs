//! Allowed-roles annotation handling
//!
//! The annotation value is a JSON list of role ARNs. Merging is append-only,
//! order-preserving and never duplicates an entry.

use k8s_openapi::api::core::v1::Namespace;

/// Decode an annotation value. Empty means no roles yet.
pub fn parse_allowed_roles(raw: &str) -> Result<Vec<String>, serde_json::Error> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(trimmed)
}

/// Append `role_arn` to an annotation value unless it is already there
pub fn add_allowed_role(current: &str, role_arn: &str) -> Result<String, serde_json::Error> {
    let mut roles = parse_allowed_roles(current)?;
    if !roles.iter().any(|r| r == role_arn) {
        roles.push(role_arn.to_string());
    }
    serde_json::to_string(&roles)
}

/// Roles currently allowed on a namespace
pub fn allowed_roles(namespace: &Namespace, annotation: &str) -> Result<Vec<String>, serde_json::Error> {
    let raw = namespace
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(annotation))
        .map(String::as_str)
        .unwrap_or("");
    parse_allowed_roles(raw)
}

/// Return the namespace with `role_arn` allowed, and whether anything changed
pub fn with_allowed_role(
    mut namespace: Namespace,
    annotation: &str,
    role_arn: &str,
) -> Result<(Namespace, bool), serde_json::Error> {
    let roles = allowed_roles(&namespace, annotation)?;
    if roles.iter().any(|r| r == role_arn) {
        return Ok((namespace, false));
    }

    let current = serde_json::to_string(&roles)?;
    let updated = add_allowed_role(&current, role_arn)?;
    namespace
        .metadata
        .annotations
        .get_or_insert_with(Default::default)
        .insert(annotation.to_string(), updated);
    Ok((namespace, true))
}
