//! Role and assignment storage.
//!
//! [`RoleStore`] is the injectable seam between the decision engine and
//! wherever role state actually lives. [`InMemoryRoleStore`] is both the
//! default backend and the test fake; a durable backend implements the
//! same trait.
//!
//! Assignments are append-only per user: revocation flips `active` on the
//! most recent matching assignment instead of deleting history, so the
//! assignment log doubles as an audit source. Mutations take the write
//! lock and therefore serialize; when a revoke races a decision, the
//! adopted rule is last write wins by timestamp.

use crate::roles::{AccessRestriction, Permission, Role};
use crate::{AccessError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::RwLock;

// ============================================================================
// RoleAssignment
// ============================================================================

/// A grant of a role to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub user_id: String,
    pub role_id: String,
    pub assigned_by: String,
    pub assigned_at: DateTime<Utc>,
    /// When set and in the past, the assignment no longer participates in
    /// decisions even while `active` is still true.
    pub expires_at: Option<DateTime<Utc>>,
    /// Soft-revocation flag; flipped to false by revocation, never deleted.
    pub active: bool,
    pub purpose: String,
}

impl RoleAssignment {
    /// Returns whether this assignment participates in access decisions at
    /// the given instant: active and not expired.
    pub fn in_force(&self, now: DateTime<Utc>) -> bool {
        self.active && self.expires_at.is_none_or(|expiry| expiry > now)
    }
}

// ============================================================================
// RoleStore
// ============================================================================

/// Storage seam for role definitions and per-user assignments.
///
/// Reads must be safe to call concurrently with each other and with
/// mutations on the implementing type.
pub trait RoleStore: Send + Sync {
    /// Looks up a role definition by id.
    fn role(&self, role_id: &str) -> Option<Role>;

    /// Returns all assignments for a user in assignment order, including
    /// revoked and expired ones.
    fn assignments_for(&self, user_id: &str) -> Vec<RoleAssignment>;
}

// ============================================================================
// InMemoryRoleStore
// ============================================================================

#[derive(Default)]
struct StoreInner {
    roles: HashMap<String, Role>,
    /// Per-user append-only assignment log.
    assignments: HashMap<String, Vec<RoleAssignment>>,
}

/// In-memory [`RoleStore`] with registry mutation operations.
#[derive(Default)]
pub struct InMemoryRoleStore {
    inner: RwLock<StoreInner>,
}

impl InMemoryRoleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces role definitions by id. Idempotent: loading
    /// the same definitions twice leaves the registry unchanged.
    ///
    /// Inheritance is *not* validated here; cycles are detected lazily at
    /// permission-lookup time so one bad definition cannot fail the load
    /// of unrelated roles.
    pub fn load_roles<I>(&self, definitions: I)
    where
        I: IntoIterator<Item = Role>,
    {
        let mut inner = self.inner.write().expect("role store lock poisoned");
        for role in definitions {
            inner.roles.insert(role.id.clone(), role);
        }
    }

    /// Appends a new assignment of `role_id` to `user_id`.
    ///
    /// # Errors
    ///
    /// [`AccessError::UnknownRole`] when `role_id` is not registered.
    /// Nothing is recorded on failure.
    pub fn assign_role(
        &self,
        user_id: &str,
        role_id: &str,
        assigned_by: &str,
        purpose: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<RoleAssignment> {
        let mut inner = self.inner.write().expect("role store lock poisoned");

        if !inner.roles.contains_key(role_id) {
            return Err(AccessError::UnknownRole(role_id.to_string()));
        }

        let assignment = RoleAssignment {
            user_id: user_id.to_string(),
            role_id: role_id.to_string(),
            assigned_by: assigned_by.to_string(),
            assigned_at: Utc::now(),
            expires_at,
            active: true,
            purpose: purpose.to_string(),
        };

        inner
            .assignments
            .entry(user_id.to_string())
            .or_default()
            .push(assignment.clone());

        Ok(assignment)
    }

    /// Marks the most recent active assignment of (`user_id`, `role_id`)
    /// inactive. Returns whether an assignment was actually revoked; a
    /// no-op revoke is still a success so the caller can audit the
    /// attempt.
    pub fn revoke_role(&self, user_id: &str, role_id: &str) -> bool {
        let mut inner = self.inner.write().expect("role store lock poisoned");

        let Some(log) = inner.assignments.get_mut(user_id) else {
            return false;
        };

        match log
            .iter_mut()
            .rev()
            .find(|a| a.role_id == role_id && a.active)
        {
            Some(assignment) => {
                assignment.active = false;
                true
            }
            None => false,
        }
    }

    /// Number of registered role definitions.
    pub fn role_count(&self) -> usize {
        self.inner.read().expect("role store lock poisoned").roles.len()
    }
}

impl RoleStore for InMemoryRoleStore {
    fn role(&self, role_id: &str) -> Option<Role> {
        self.inner
            .read()
            .expect("role store lock poisoned")
            .roles
            .get(role_id)
            .cloned()
    }

    fn assignments_for(&self, user_id: &str) -> Vec<RoleAssignment> {
        self.inner
            .read()
            .expect("role store lock poisoned")
            .assignments
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }
}

// ============================================================================
// Role resolution
// ============================================================================

/// A role flattened through its inheritance chain.
#[derive(Debug, Clone)]
pub struct ResolvedRole {
    pub role_id: String,
    /// Own + inherited permissions in breadth-first order, de-duplicated
    /// by (action, pattern) keeping the first occurrence.
    pub permissions: Vec<Permission>,
    /// Own + inherited restrictions. Restrictions never widen access, so
    /// inheriting them is the fail-closed reading.
    pub restrictions: Vec<AccessRestriction>,
    /// True when the inheritance graph reaching this role contains a
    /// cycle. A cyclic role resolves to zero permissions (fails closed).
    pub cycle: bool,
}

/// Resolves a role through its inheritance chain, breadth-first.
///
/// Returns `None` when the role id is unknown. A cycle anywhere in the
/// reachable inheritance graph makes the role resolve with zero
/// permissions and `cycle = true`; the caller is responsible for raising
/// the configuration error event.
pub fn resolve_role(store: &dyn RoleStore, role_id: &str) -> Option<ResolvedRole> {
    let root = store.role(role_id)?;

    if has_inheritance_cycle(store, role_id) {
        tracing::error!(role_id, "role inheritance cycle: resolving to zero permissions");
        return Some(ResolvedRole {
            role_id: role_id.to_string(),
            permissions: Vec::new(),
            restrictions: Vec::new(),
            cycle: true,
        });
    }

    let mut permissions: Vec<Permission> = Vec::new();
    let mut restrictions: Vec<AccessRestriction> = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<Role> = VecDeque::new();

    visited.insert(root.id.clone());
    queue.push_back(root);

    while let Some(role) = queue.pop_front() {
        for permission in &role.permissions {
            let key = permission.dedup_key();
            if !permissions.iter().any(|p| p.dedup_key() == key) {
                permissions.push(permission.clone());
            }
        }
        for restriction in &role.restrictions {
            if !restrictions.contains(restriction) {
                restrictions.push(restriction.clone());
            }
        }
        for parent_id in &role.inherits {
            if visited.insert(parent_id.clone()) {
                // Unknown parents are skipped: a dangling inherited id
                // weakens the role but cannot fail unrelated decisions.
                if let Some(parent) = store.role(parent_id) {
                    queue.push_back(parent);
                } else {
                    tracing::warn!(role_id = %parent_id, "inherited role not found; skipping");
                }
            }
        }
    }

    Some(ResolvedRole {
        role_id: role_id.to_string(),
        permissions,
        restrictions,
        cycle: false,
    })
}

/// The union of permissions across every assignment in force for a user,
/// breadth-first through inheritance, de-duplicated by (action, pattern).
///
/// Cyclic roles contribute nothing; their ids are returned so the caller
/// can audit the configuration error.
pub fn effective_permissions(
    store: &dyn RoleStore,
    user_id: &str,
    now: DateTime<Utc>,
) -> (Vec<Permission>, Vec<String>) {
    let mut permissions: Vec<Permission> = Vec::new();
    let mut cycle_roles: Vec<String> = Vec::new();

    for assignment in store.assignments_for(user_id) {
        if !assignment.in_force(now) {
            continue;
        }
        let Some(resolved) = resolve_role(store, &assignment.role_id) else {
            continue;
        };
        if resolved.cycle {
            if !cycle_roles.contains(&resolved.role_id) {
                cycle_roles.push(resolved.role_id);
            }
            continue;
        }
        for permission in resolved.permissions {
            let key = permission.dedup_key();
            if !permissions.iter().any(|p| p.dedup_key() == key) {
                permissions.push(permission);
            }
        }
    }

    (permissions, cycle_roles)
}

/// Detects a cycle in the inheritance graph reachable from `role_id`
/// using depth-first traversal with an explicit in-progress stack.
fn has_inheritance_cycle(store: &dyn RoleStore, role_id: &str) -> bool {
    fn visit(
        store: &dyn RoleStore,
        id: &str,
        in_progress: &mut HashSet<String>,
        done: &mut HashSet<String>,
    ) -> bool {
        if done.contains(id) {
            return false;
        }
        if !in_progress.insert(id.to_string()) {
            return true;
        }
        if let Some(role) = store.role(id) {
            for parent in &role.inherits {
                if visit(store, parent, in_progress, done) {
                    return true;
                }
            }
        }
        in_progress.remove(id);
        done.insert(id.to_string());
        false
    }

    let mut in_progress = HashSet::new();
    let mut done = HashSet::new();
    visit(store, role_id, &mut in_progress, &mut done)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::Permission;
    use chrono::Duration;
    use tourmaline_types::AccessAction;

    fn store_with(roles: Vec<Role>) -> InMemoryRoleStore {
        let store = InMemoryRoleStore::new();
        store.load_roles(roles);
        store
    }

    #[test]
    fn test_load_roles_is_idempotent_and_replaces() {
        let store = InMemoryRoleStore::new();
        store.load_roles(vec![Role::new("user", "User")]);
        store.load_roles(vec![Role::new("user", "User")]);
        assert_eq!(store.role_count(), 1);

        // Replacement by id
        store.load_roles(vec![
            Role::new("user", "Portal User")
                .with_permission(Permission::grant(AccessAction::Read, "*")),
        ]);
        let role = store.role("user").unwrap();
        assert_eq!(role.name, "Portal User");
        assert_eq!(role.permissions.len(), 1);
    }

    #[test]
    fn test_assign_unknown_role_fails() {
        let store = InMemoryRoleStore::new();
        let result = store.assign_role("u1", "ghost", "admin", "testing", None);
        assert!(matches!(result, Err(AccessError::UnknownRole(_))));
        assert!(store.assignments_for("u1").is_empty());
    }

    #[test]
    fn test_assignments_are_append_only() {
        let store = store_with(vec![Role::new("user", "User")]);

        store.assign_role("u1", "user", "admin", "onboarding", None).unwrap();
        store.assign_role("u1", "user", "admin", "re-grant", None).unwrap();

        let log = store.assignments_for("u1");
        assert_eq!(log.len(), 2);
        assert!(log.iter().all(|a| a.active));
    }

    #[test]
    fn test_revoke_flips_most_recent_active() {
        let store = store_with(vec![Role::new("user", "User")]);

        store.assign_role("u1", "user", "admin", "first", None).unwrap();
        store.assign_role("u1", "user", "admin", "second", None).unwrap();

        assert!(store.revoke_role("u1", "user"));

        let log = store.assignments_for("u1");
        // History preserved: the first grant is untouched, the most
        // recent one is flipped.
        assert_eq!(log.len(), 2);
        assert!(log[0].active);
        assert!(!log[1].active);
    }

    #[test]
    fn test_revoke_without_assignment_is_noop() {
        let store = store_with(vec![Role::new("user", "User")]);
        assert!(!store.revoke_role("u1", "user"));
        assert!(!store.revoke_role("nobody", "user"));
    }

    #[test]
    fn test_expired_assignment_not_in_force() {
        let store = store_with(vec![Role::new("user", "User")]);
        let past = Utc::now() - Duration::hours(1);
        store.assign_role("u1", "user", "admin", "short-lived", Some(past)).unwrap();

        let log = store.assignments_for("u1");
        assert!(log[0].active, "expiry does not flip the active flag");
        assert!(!log[0].in_force(Utc::now()));
    }

    #[test]
    fn test_resolve_inherited_permissions_breadth_first() {
        let store = store_with(vec![
            Role::new("employee", "Employee")
                .with_permission(Permission::grant(AccessAction::Read, "directory.*")),
            Role::new("advisor", "Advisor")
                .with_permission(Permission::grant(AccessAction::Read, "client_profile.*"))
                .inherits_from("employee"),
        ]);

        let resolved = resolve_role(&store, "advisor").unwrap();
        assert!(!resolved.cycle);
        assert_eq!(resolved.permissions.len(), 2);
        // Own permissions come before inherited ones
        assert_eq!(
            resolved.permissions[0].resource.to_string(),
            "client_profile.*"
        );
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let store = store_with(vec![
            Role::new("base", "Base").with_permission(
                Permission::grant(AccessAction::Read, "reports.monthly")
                    .with_condition(crate::roles::AccessCondition::MfaRequired),
            ),
            Role::new("derived", "Derived")
                .with_permission(Permission::grant(AccessAction::Read, "reports.monthly"))
                .inherits_from("base"),
        ]);

        let resolved = resolve_role(&store, "derived").unwrap();
        assert_eq!(resolved.permissions.len(), 1);
        // The derived role's unconditional permission wins the dedup
        assert!(resolved.permissions[0].conditions.is_empty());
    }

    #[test]
    fn test_cycle_resolves_to_zero_permissions() {
        let store = store_with(vec![
            Role::new("a", "A")
                .with_permission(Permission::grant(AccessAction::Read, "*"))
                .inherits_from("b"),
            Role::new("b", "B").inherits_from("a"),
        ]);

        let resolved = resolve_role(&store, "a").unwrap();
        assert!(resolved.cycle);
        assert!(resolved.permissions.is_empty());
    }

    #[test]
    fn test_diamond_inheritance_is_not_a_cycle() {
        let store = store_with(vec![
            Role::new("root", "Root")
                .with_permission(Permission::grant(AccessAction::Read, "shared.*")),
            Role::new("left", "Left").inherits_from("root"),
            Role::new("right", "Right").inherits_from("root"),
            Role::new("top", "Top").inherits_from("left").inherits_from("right"),
        ]);

        let resolved = resolve_role(&store, "top").unwrap();
        assert!(!resolved.cycle);
        assert_eq!(resolved.permissions.len(), 1);
    }

    #[test]
    fn test_effective_permissions_union_across_assignments() {
        let store = store_with(vec![
            Role::new("viewer", "Viewer")
                .with_permission(Permission::grant(AccessAction::Read, "reports.*")),
            Role::new("exporter", "Exporter")
                .with_permission(Permission::grant(AccessAction::Export, "reports.*")),
        ]);

        store.assign_role("u1", "viewer", "admin", "work", None).unwrap();
        store.assign_role("u1", "exporter", "admin", "work", None).unwrap();

        let (perms, cycles) = effective_permissions(&store, "u1", Utc::now());
        assert_eq!(perms.len(), 2);
        assert!(cycles.is_empty());
    }

    #[test]
    fn test_effective_permissions_skips_revoked_and_expired() {
        let store = store_with(vec![
            Role::new("viewer", "Viewer")
                .with_permission(Permission::grant(AccessAction::Read, "reports.*")),
            Role::new("temp", "Temp")
                .with_permission(Permission::grant(AccessAction::Write, "drafts.*")),
        ]);

        store.assign_role("u1", "viewer", "admin", "work", None).unwrap();
        let past = Utc::now() - Duration::days(1);
        store.assign_role("u1", "temp", "admin", "expired", Some(past)).unwrap();
        store.assign_role("u1", "temp", "admin", "revoked", None).unwrap();
        store.revoke_role("u1", "temp");

        let (perms, _) = effective_permissions(&store, "u1", Utc::now());
        assert_eq!(perms.len(), 1);
        assert_eq!(perms[0].action, AccessAction::Read);
    }

    #[test]
    fn test_cyclic_role_reported_not_propagated() {
        let store = store_with(vec![
            Role::new("looper", "Looper").inherits_from("looper"),
            Role::new("viewer", "Viewer")
                .with_permission(Permission::grant(AccessAction::Read, "reports.*")),
        ]);

        store.assign_role("u1", "looper", "admin", "bad config", None).unwrap();
        store.assign_role("u1", "viewer", "admin", "work", None).unwrap();

        let (perms, cycles) = effective_permissions(&store, "u1", Utc::now());
        // The healthy role still works; the cyclic one is reported.
        assert_eq!(perms.len(), 1);
        assert_eq!(cycles, vec!["looper"]);
    }
}
