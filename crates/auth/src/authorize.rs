use serde::Serialize;
use thiserror::Error;

use crate::{NormalizedPermissions, Permission, PermissionSet};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// The user holds no permissions at all for this scope.
    #[error("no permissions on scope '{0}'")]
    ScopeNotFound(String),

    /// Grouped permissions were checked without selecting a group.
    #[error("grouped permissions require a scope key")]
    ScopeRequired,

    #[error("no match found on {required:?} against {available:?}")]
    Denied {
        required: Vec<String>,
        available: Vec<String>,
    },
}

impl AccessError {
    pub fn kind(&self) -> DenialKind {
        match self {
            AccessError::ScopeNotFound(_) => DenialKind::ScopeNotFound,
            AccessError::ScopeRequired => DenialKind::ScopeRequired,
            AccessError::Denied { .. } => DenialKind::MissingPermission,
        }
    }
}

/// Select the permission set a check runs against.
///
/// Without a scope key the structure must be flat; with one, it selects that
/// group. A flat structure has no groups, so any scope key is unknown there.
pub fn relevant_permissions<'a>(
    permissions: &'a NormalizedPermissions,
    scope_key: Option<&str>,
) -> Result<&'a PermissionSet, AccessError> {
    match (permissions, scope_key) {
        (NormalizedPermissions::Flat(set), None) => Ok(set),
        (NormalizedPermissions::Grouped(_), None) => Err(AccessError::ScopeRequired),
        (_, Some(key)) => {
            tracing::debug!(scope = %key, "selecting scoped permissions");
            permissions
                .group(key)
                .ok_or_else(|| AccessError::ScopeNotFound(key.to_string()))
        }
    }
}

/// Decide whether any of `required` is held.
///
/// - OR semantics: the first match grants
/// - required names are lower-cased, stored names are compared as-is
/// - No IO, no panics
pub fn has_access(
    required: &[Permission],
    permissions: &NormalizedPermissions,
    scope_key: Option<&str>,
) -> Result<(), AccessError> {
    let relevant = relevant_permissions(permissions, scope_key)?;

    for perm in required {
        let key = perm.lookup_key();
        tracing::debug!(permission = %key, available = relevant.len(), "check user has permission");
        if relevant.contains(&key) {
            return Ok(());
        }
    }

    Err(AccessError::Denied {
        required: required.iter().map(|p| p.as_str().to_string()).collect(),
        available: relevant.sorted(),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Access Explanation (server-side diagnostics)
// ─────────────────────────────────────────────────────────────────────────────

/// Detailed explanation of an access decision.
///
/// This is for logs and operators only. It lists the user's permissions and
/// must never be returned to the GraphQL client.
#[derive(Debug, Clone, Serialize)]
pub struct AccessExplanation {
    pub required: Vec<String>,
    pub scope_key: Option<String>,
    pub granted: bool,
    /// The required permission that matched, if any.
    pub granted_by: Option<String>,
    pub reason: String,
    /// Permissions considered for the decision (sorted).
    pub effective_permissions: Vec<String>,
    pub denial_reason: Option<DenialReason>,
}

/// Detailed reason why access was denied.
#[derive(Debug, Clone, Serialize)]
pub struct DenialReason {
    pub kind: DenialKind,
    pub message: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    ScopeNotFound,
    ScopeRequired,
    MissingPermission,
}

/// Explain why a check against `permissions` is (or would be) granted or denied.
///
/// Follows exactly the same rules as [`has_access`].
pub fn explain_access(
    required: &[Permission],
    permissions: &NormalizedPermissions,
    scope_key: Option<&str>,
) -> AccessExplanation {
    let required_names: Vec<String> = required.iter().map(|p| p.as_str().to_string()).collect();
    let scope = scope_key.map(str::to_string);

    let relevant = match relevant_permissions(permissions, scope_key) {
        Ok(set) => set,
        Err(err) => {
            let suggestions = match &err {
                AccessError::ScopeNotFound(key) => vec![
                    format!("Grant the user at least one permission within scope '{key}'"),
                    "Check that the scope path resolves to the identifier the permission source uses"
                        .to_string(),
                ],
                _ => vec![
                    "Configure a scope path on the guard so a group can be selected".to_string(),
                ],
            };
            return AccessExplanation {
                required: required_names,
                scope_key: scope,
                granted: false,
                granted_by: None,
                reason: err.to_string(),
                effective_permissions: Vec::new(),
                denial_reason: Some(DenialReason {
                    kind: err.kind(),
                    message: err.to_string(),
                    suggestions,
                }),
            };
        }
    };

    let effective = relevant.sorted();
    let granted_by = required
        .iter()
        .find(|p| relevant.contains(&p.lookup_key()))
        .map(|p| p.as_str().to_string());

    if let Some(perm) = granted_by {
        return AccessExplanation {
            reason: format!("User holds permission '{}'", perm.to_lowercase()),
            required: required_names,
            scope_key: scope,
            granted: true,
            granted_by: Some(perm),
            effective_permissions: effective,
            denial_reason: None,
        };
    }

    let mut suggestions: Vec<String> = required
        .iter()
        .map(|p| format!("Grant '{}' to the user", p.lookup_key()))
        .collect();

    // Stored names are not lower-cased, so a source returning "Notes.Read"
    // can never satisfy a guard requiring "notes.read".
    for perm in required {
        let key = perm.lookup_key();
        if let Some(stored) = relevant.iter().find(|s| *s != key && s.to_lowercase() == key) {
            suggestions.insert(
                0,
                format!(
                    "Stored permission '{stored}' differs from '{key}' only by case; the permission source must return lower-case names"
                ),
            );
        }
    }

    AccessExplanation {
        reason: format!(
            "User holds none of {:?}. Current permissions: {:?}",
            required_names, effective
        ),
        required: required_names,
        scope_key: scope,
        granted: false,
        granted_by: None,
        effective_permissions: effective,
        denial_reason: Some(DenialReason {
            kind: DenialKind::MissingPermission,
            message: "Missing all of the required permissions".to_string(),
            suggestions,
        }),
    }
}
