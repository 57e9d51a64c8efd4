//! Role, permission, condition, and restriction definitions.
//!
//! A [`Role`] bundles what its holders may do ([`Permission`]s, each gated
//! by [`AccessCondition`]s) with what still applies when they do it
//! ([`AccessRestriction`]s). Roles may inherit permissions from other
//! roles; inheritance is resolved lazily at decision time.
//!
//! Roles are process-wide and effectively immutable after load — updating
//! a role replaces it by id, never mutates it in place.

use crate::pattern::ResourcePattern;
use serde::{Deserialize, Serialize};
use tourmaline_types::{AccessAction, Sensitivity};

// ============================================================================
// Conditions
// ============================================================================

/// A condition gating a permission. All conditions on a permission must
/// hold (logical AND) for the permission to take effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum AccessCondition {
    /// Access only between `start_hour` (inclusive) and `end_hour`
    /// (exclusive), UTC.
    TimeWindow { start_hour: u8, end_hour: u8 },

    /// Request must originate from one of these addresses.
    IpWhitelist(Vec<String>),

    /// The request's declared purpose must equal this value.
    Purpose(String),

    /// The data subject's consent flag must be present.
    ConsentRequired,

    /// The session must have completed multi-factor authentication.
    MfaRequired,
}

impl std::fmt::Display for AccessCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessCondition::TimeWindow {
                start_hour,
                end_hour,
            } => {
                write!(f, "time window {start_hour:02}:00-{end_hour:02}:00 UTC")
            }
            AccessCondition::IpWhitelist(_) => f.write_str("ip whitelist"),
            AccessCondition::Purpose(p) => write!(f, "purpose '{p}'"),
            AccessCondition::ConsentRequired => f.write_str("consent required"),
            AccessCondition::MfaRequired => f.write_str("mfa required"),
        }
    }
}

// ============================================================================
// Restrictions
// ============================================================================

/// A restriction that applies to granted access.
///
/// Restrictions never widen access; they constrain what a grant means:
/// which fields are redacted, whether the grant is read-only, whether the
/// access must be audited or approved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum AccessRestriction {
    /// The listed field paths are redacted from responses.
    /// Paths may traverse arrays with a `*` segment (`accounts.*.iban`).
    FieldMasking { fields: Vec<String>, message: String },

    /// The grant covers reading only, regardless of requested action.
    ReadOnly { message: String },

    /// Every access under this role must produce an audit record.
    AuditRequired { message: String },

    /// Access requires out-of-band approval before the result is released.
    ApprovalRequired { message: String },
}

impl AccessRestriction {
    /// Convenience constructor for a field-masking restriction.
    pub fn mask_fields<I, S>(fields: I, message: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AccessRestriction::FieldMasking {
            fields: fields.into_iter().map(Into::into).collect(),
            message: message.to_string(),
        }
    }

    /// Convenience constructor for an audit-required restriction.
    pub fn audit_required(message: &str) -> Self {
        AccessRestriction::AuditRequired {
            message: message.to_string(),
        }
    }
}

// ============================================================================
// Permission
// ============================================================================

/// A single permission: an action on a resource pattern, gated by
/// conditions, granted or explicitly denied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub action: AccessAction,
    pub resource: ResourcePattern,
    pub conditions: Vec<AccessCondition>,
    pub granted: bool,
}

impl Permission {
    /// Creates a granting permission for `action` on the pattern parsed
    /// from `resource`.
    pub fn grant(action: AccessAction, resource: &str) -> Self {
        Self {
            action,
            resource: ResourcePattern::parse(resource),
            conditions: Vec::new(),
            granted: true,
        }
    }

    /// Creates an explicitly denying permission.
    pub fn deny(action: AccessAction, resource: &str) -> Self {
        Self {
            granted: false,
            ..Self::grant(action, resource)
        }
    }

    /// Adds a condition (builder pattern).
    pub fn with_condition(mut self, condition: AccessCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// The de-duplication key for effective-permission unions.
    pub fn dedup_key(&self) -> (AccessAction, &ResourcePattern) {
        (self.action, &self.resource)
    }
}

// ============================================================================
// Role
// ============================================================================

/// A role definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Stable identifier; assignments and inheritance reference this.
    pub id: String,
    /// Human-readable name for audit records.
    pub name: String,
    /// The highest sensitivity this role is cleared for.
    pub data_access_level: Sensitivity,
    pub permissions: Vec<Permission>,
    pub restrictions: Vec<AccessRestriction>,
    /// Ids of roles whose permissions this role inherits.
    pub inherits: Vec<String>,
}

impl Role {
    /// Creates an empty role with the given id and name.
    pub fn new(id: &str, name: &str) -> Self {
        assert!(!id.is_empty(), "role id must not be empty");
        Self {
            id: id.to_string(),
            name: name.to_string(),
            data_access_level: Sensitivity::Internal,
            permissions: Vec::new(),
            restrictions: Vec::new(),
            inherits: Vec::new(),
        }
    }

    /// Sets the clearance level (builder pattern).
    pub fn with_access_level(mut self, level: Sensitivity) -> Self {
        self.data_access_level = level;
        self
    }

    /// Adds a permission (builder pattern).
    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permissions.push(permission);
        self
    }

    /// Adds a restriction (builder pattern).
    pub fn with_restriction(mut self, restriction: AccessRestriction) -> Self {
        self.restrictions.push(restriction);
        self
    }

    /// Adds an inherited role id (builder pattern).
    pub fn inherits_from(mut self, role_id: &str) -> Self {
        if !self.inherits.contains(&role_id.to_string()) {
            self.inherits.push(role_id.to_string());
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_builder() {
        let role = Role::new("advisor", "Financial Advisor")
            .with_access_level(Sensitivity::Confidential)
            .with_permission(
                Permission::grant(AccessAction::Read, "client_profile.*")
                    .with_condition(AccessCondition::Purpose("advisory".to_string())),
            )
            .with_restriction(AccessRestriction::mask_fields(
                ["personal_info.ssn"],
                "clients' ssn hidden from advisors",
            ))
            .inherits_from("employee");

        assert_eq!(role.id, "advisor");
        assert_eq!(role.permissions.len(), 1);
        assert_eq!(role.restrictions.len(), 1);
        assert_eq!(role.inherits, vec!["employee"]);
        assert!(role.permissions[0].granted);
    }

    #[test]
    fn test_deny_permission() {
        let perm = Permission::deny(AccessAction::Export, "*");
        assert!(!perm.granted);
        assert_eq!(perm.action, AccessAction::Export);
    }

    #[test]
    fn test_inherits_from_deduplicates() {
        let role = Role::new("a", "A").inherits_from("b").inherits_from("b");
        assert_eq!(role.inherits.len(), 1);
    }

    #[test]
    #[should_panic(expected = "role id must not be empty")]
    fn test_empty_role_id_panics() {
        Role::new("", "nameless");
    }

    #[test]
    fn test_condition_display() {
        let c = AccessCondition::TimeWindow {
            start_hour: 8,
            end_hour: 18,
        };
        assert_eq!(c.to_string(), "time window 08:00-18:00 UTC");
        assert_eq!(
            AccessCondition::Purpose("personal_use".to_string()).to_string(),
            "purpose 'personal_use'"
        );
    }
}
