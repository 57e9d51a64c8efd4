//! Access decision engine.
//!
//! [`AccessEngine::check_access`] turns (user, action, resource, context)
//! into an [`AccessDecision`]. The engine is stateless per call beyond
//! reading the shared [`RoleStore`]; concurrent calls need no mutual
//! exclusion among themselves.
//!
//! ## Algorithm
//!
//! 1. Gather the user's assignments in force (active, non-expired). None
//!    at all ⇒ denied "no role assigned".
//! 2. Scan assignments in assignment order. Per assignment, resolve the
//!    role through inheritance and pick the best-precedence permission
//!    whose action matches exactly and whose pattern matches the resource
//!    (Exact beats Prefix beats Any).
//! 3. A permission with `granted = false` fails this assignment but never
//!    short-circuits the scan. A granting permission has its conditions
//!    AND-evaluated against the context; any failure fails the assignment,
//!    records which conditions failed, and forces auditing.
//! 4. Roles compose by OR: any successful assignment grants. Restrictions
//!    and masked fields are the union over the granting roles.
//! 5. An exhausted scan denies with the last failure per assignment.

use crate::masking::mask_fields;
use crate::roles::{AccessCondition, AccessRestriction, Permission};
use crate::store::{resolve_role, RoleStore};
use crate::{AccessError, Result};
use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tourmaline_types::AccessAction;

// ============================================================================
// AccessContext
// ============================================================================

/// Caller-supplied request context.
///
/// Only four keys participate in condition evaluation: `purpose`,
/// `ip_address`, `has_consent`, `mfa_verified`. A missing key makes the
/// corresponding condition evaluate to false; anything else a caller
/// knows about the request is ignored here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessContext {
    pub purpose: Option<String>,
    pub ip_address: Option<String>,
    pub has_consent: bool,
    pub mfa_verified: bool,
    /// Evaluation instant for time-window conditions; `None` means "now".
    /// Exists so decisions are reproducible in tests and replays.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub at: Option<DateTime<Utc>>,
}

impl AccessContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the declared purpose (builder pattern).
    pub fn with_purpose(mut self, purpose: &str) -> Self {
        self.purpose = Some(purpose.to_string());
        self
    }

    /// Sets the source address (builder pattern).
    pub fn with_ip(mut self, ip: &str) -> Self {
        self.ip_address = Some(ip.to_string());
        self
    }

    /// Marks the data subject's consent as present (builder pattern).
    pub fn with_consent(mut self) -> Self {
        self.has_consent = true;
        self
    }

    /// Marks the session as MFA-verified (builder pattern).
    pub fn with_mfa(mut self) -> Self {
        self.mfa_verified = true;
        self
    }

    /// Pins the evaluation instant (builder pattern).
    pub fn at(mut self, instant: DateTime<Utc>) -> Self {
        self.at = Some(instant);
        self
    }

    fn effective_time(&self) -> DateTime<Utc> {
        self.at.unwrap_or_else(Utc::now)
    }
}

// ============================================================================
// AccessDecision
// ============================================================================

/// A condition that failed during the scan, attributed to the role whose
/// permission carried it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionFailure {
    pub role_id: String,
    pub condition: AccessCondition,
    pub reason: String,
}

/// The outcome of an access check.
///
/// Denial is a value, not an error: `granted = false` with a reason the
/// caller can branch on and the audit trail can record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessDecision {
    pub granted: bool,
    pub reason: String,
    /// Union of the granting roles' restrictions (empty when denied).
    pub restrictions: Vec<AccessRestriction>,
    /// Whether this access must produce an audit record.
    pub audit_required: bool,
    /// Conditions that failed during the scan, for audit metadata. May be
    /// non-empty even on a grant when another role's conditions failed.
    pub failed_conditions: Vec<ConditionFailure>,
    /// Union of `FieldMasking` field paths across granting roles.
    pub masked_fields: Vec<String>,
    /// Role ids whose inheritance graph contained a cycle. The caller
    /// raises the configuration-error event; decisions on healthy roles
    /// are unaffected.
    pub cycle_roles: Vec<String>,
}

impl AccessDecision {
    fn denied(reason: String) -> Self {
        Self {
            granted: false,
            reason,
            restrictions: Vec::new(),
            audit_required: true,
            failed_conditions: Vec::new(),
            masked_fields: Vec::new(),
            cycle_roles: Vec::new(),
        }
    }
}

// ============================================================================
// AccessEngine
// ============================================================================

/// The decision engine. Cheap to clone; holds only the store handle.
#[derive(Clone)]
pub struct AccessEngine {
    store: Arc<dyn RoleStore>,
}

impl AccessEngine {
    pub fn new(store: Arc<dyn RoleStore>) -> Self {
        Self { store }
    }

    /// Decides whether `user_id` may perform `action` on `resource` under
    /// the given context.
    pub fn check_access(
        &self,
        user_id: &str,
        action: AccessAction,
        resource: &str,
        ctx: &AccessContext,
    ) -> AccessDecision {
        let now = ctx.effective_time();

        let assignments: Vec<_> = self
            .store
            .assignments_for(user_id)
            .into_iter()
            .filter(|a| a.in_force(now))
            .collect();

        if assignments.is_empty() {
            return AccessDecision::denied("no role assigned".to_string());
        }

        let mut failures: Vec<String> = Vec::new();
        let mut failed_conditions: Vec<ConditionFailure> = Vec::new();
        let mut cycle_roles: Vec<String> = Vec::new();
        let mut granting_roles: Vec<String> = Vec::new();
        let mut restrictions: Vec<AccessRestriction> = Vec::new();
        let mut condition_audit = false;

        for assignment in &assignments {
            let role_id = assignment.role_id.as_str();

            let Some(resolved) = resolve_role(self.store.as_ref(), role_id) else {
                failures.push(format!("{role_id}: role definition missing"));
                continue;
            };

            if resolved.cycle {
                if !cycle_roles.contains(&resolved.role_id) {
                    cycle_roles.push(resolved.role_id.clone());
                }
                failures.push(format!("{role_id}: inheritance cycle, zero permissions"));
                continue;
            }

            let Some(permission) = best_match(&resolved.permissions, action, resource) else {
                failures.push(format!("{role_id}: no permission for {action} on {resource}"));
                continue;
            };

            if !permission.granted {
                failures.push(format!("{role_id}: {action} on {resource} explicitly denied"));
                continue;
            }

            let failed: Vec<ConditionFailure> = permission
                .conditions
                .iter()
                .filter(|c| !condition_holds(c, ctx, now))
                .map(|c| ConditionFailure {
                    role_id: role_id.to_string(),
                    condition: c.clone(),
                    reason: format!("condition not met: {c}"),
                })
                .collect();

            if failed.is_empty() {
                if !granting_roles.contains(&resolved.role_id) {
                    granting_roles.push(resolved.role_id.clone());
                    for restriction in resolved.restrictions {
                        if !restrictions.contains(&restriction) {
                            restrictions.push(restriction);
                        }
                    }
                }
            } else {
                // A failed condition is an access-control event worth a
                // record even when another role later grants.
                condition_audit = true;
                failures.push(format!(
                    "{role_id}: {}",
                    failed
                        .iter()
                        .map(|f| f.reason.clone())
                        .collect::<Vec<_>>()
                        .join(", ")
                ));
                failed_conditions.extend(failed);
            }
        }

        if granting_roles.is_empty() {
            let mut decision = AccessDecision::denied(failures.join("; "));
            decision.failed_conditions = failed_conditions;
            decision.cycle_roles = cycle_roles;
            return decision;
        }

        let masked_fields = collect_masked_fields(&restrictions);
        let audit_required = condition_audit
            || action.always_audited()
            || restrictions
                .iter()
                .any(|r| matches!(r, AccessRestriction::AuditRequired { .. }));

        AccessDecision {
            granted: true,
            reason: format!("granted via role(s): {}", granting_roles.join(", ")),
            restrictions,
            audit_required,
            failed_conditions,
            masked_fields,
            cycle_roles,
        }
    }

    /// Checks `Read` access on `resource` and returns a new copy of `data`
    /// with the decision's masked field paths redacted.
    ///
    /// # Errors
    ///
    /// [`AccessError::Denied`] when the read is not granted. The input is
    /// never mutated and nothing is returned on denial.
    pub fn filter_record(
        &self,
        data: &Value,
        user_id: &str,
        resource: &str,
        ctx: &AccessContext,
    ) -> Result<Value> {
        let decision = self.check_access(user_id, AccessAction::Read, resource, ctx);
        if !decision.granted {
            return Err(AccessError::Denied(decision.reason));
        }
        Ok(mask_fields(data, &decision.masked_fields))
    }
}

/// Picks the matching permission with the best pattern precedence.
///
/// Among permissions whose action matches exactly and whose pattern
/// matches the resource, the lowest precedence value (most specific
/// pattern) wins; ties keep the earlier permission.
fn best_match<'a>(
    permissions: &'a [Permission],
    action: AccessAction,
    resource: &str,
) -> Option<&'a Permission> {
    permissions
        .iter()
        .filter(|p| p.action == action && p.resource.matches(resource))
        .min_by_key(|p| p.resource.precedence())
}

/// Evaluates one condition against the context. Missing context keys make
/// the condition fail, never pass.
fn condition_holds(condition: &AccessCondition, ctx: &AccessContext, now: DateTime<Utc>) -> bool {
    match condition {
        AccessCondition::Purpose(required) => {
            ctx.purpose.as_deref() == Some(required.as_str())
        }
        AccessCondition::ConsentRequired => ctx.has_consent,
        AccessCondition::MfaRequired => ctx.mfa_verified,
        AccessCondition::IpWhitelist(allowed) => ctx
            .ip_address
            .as_deref()
            .is_some_and(|ip| allowed.iter().any(|a| a == ip)),
        AccessCondition::TimeWindow {
            start_hour,
            end_hour,
        } => {
            let hour = now.hour() as u8;
            if start_hour <= end_hour {
                (*start_hour..*end_hour).contains(&hour)
            } else {
                // Window wraps midnight, e.g. 22-06
                hour >= *start_hour || hour < *end_hour
            }
        }
    }
}

fn collect_masked_fields(restrictions: &[AccessRestriction]) -> Vec<String> {
    let mut fields: Vec<String> = Vec::new();
    for restriction in restrictions {
        if let AccessRestriction::FieldMasking { fields: list, .. } = restriction {
            for field in list {
                if !fields.contains(field) {
                    fields.push(field.clone());
                }
            }
        }
    }
    fields
}

// ============================================================================
// Tests
// ============================================================================
