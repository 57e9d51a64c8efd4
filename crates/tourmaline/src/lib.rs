//! # Tourmaline
//!
//! A privacy and access-control core for sensitive personal/financial
//! records. For every request it decides whether an identity may perform
//! an action on a resource, which fields must be hidden from the
//! response, and records a tamper-resistant trail of every
//! security-relevant event — including automatic detection of suspicious
//! access patterns. Content bound for an external text-generation
//! collaborator passes through reversible anonymization first, and
//! validation confirms nothing sensitive leaks back out.
//!
//! ## Crates
//!
//! | Crate | Concern |
//! |-------|---------|
//! | `tourmaline-types` | Sensitivity levels, actions, classification tables |
//! | `tourmaline-access` | Role registry, decision engine, field masking |
//! | `tourmaline-audit` | Audit trail, incident detection, breach lifecycle |
//! | `tourmaline-anonymize` | Reversible anonymization and validation |
//! | `tourmaline-crypto` | Key management interface and AES-256-GCM backend |
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use tourmaline::{
//!     AccessAction, AccessCondition, AccessContext, InMemoryRoleStore, MemorySink,
//!     Permission, RequestMeta, Role, SecurityCore,
//! };
//!
//! let roles = Arc::new(InMemoryRoleStore::new());
//! roles.load_roles(vec![Role::new("user", "Portal User").with_permission(
//!     Permission::grant(AccessAction::Read, "tax_profile.own")
//!         .with_condition(AccessCondition::Purpose("personal_use".into())),
//! )]);
//!
//! let core = SecurityCore::new(roles, Arc::new(MemorySink::new())).unwrap();
//! let meta = RequestMeta::new("10.0.0.5", "portal/2.1");
//!
//! core.assign_role("jean", "user", "admin", "onboarding", None, &meta)
//!     .unwrap();
//!
//! let decision = core.check_access(
//!     "jean",
//!     AccessAction::Read,
//!     "tax_profile.own",
//!     &AccessContext::new().with_purpose("personal_use"),
//!     &meta,
//! );
//! assert!(decision.granted);
//! ```

pub mod security;

pub use security::{CoreError, RequestMeta, SecurityCore};

// Re-export the workspace surface so dependents need only this crate.
pub use tourmaline_access::{
    mask_fields, AccessCondition, AccessContext, AccessDecision, AccessEngine, AccessError,
    AccessRestriction, InMemoryRoleStore, Permission, ResourcePattern, Role, RoleAssignment,
    RoleStore, MASKED_MARKER,
};
pub use tourmaline_anonymize::{
    AnonymizationContext, AnonymizedContent, AnonymizeError, Anonymizer, RiskLevel,
    ValidationReport,
};
pub use tourmaline_audit::{
    AuditAction, AuditConfig, AuditError, AuditEvent, AuditEventDraft, AuditQuery, AuditReport,
    AuditResult, AuditSink, AuditStatistics, AuditTrail, BreachEvent, BreachLog, BreachSeverity,
    BreachStatus, MemorySink,
};
pub use tourmaline_crypto::{AesGcmKeyManager, CryptoError, KeyManager, SealedRecord};
pub use tourmaline_types::{AccessAction, ClassificationTable, Sensitivity};
