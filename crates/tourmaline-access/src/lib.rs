//! # tourmaline-access: who may do what, and what they may see
//!
//! Provides the access-control half of the Tourmaline core:
//! - **Role registry** — role definitions with inheritance, append-only
//!   per-user assignments with expiry and soft revocation
//! - **Access decision engine** — grant/deny with restrictions, evaluated
//!   across every role a principal holds (OR semantics)
//! - **Field masking** — pure redaction of field paths in a record before
//!   it leaves the core
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  check_access(user, action, resource, ctx)   │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  AccessEngine                                │
//! │  ├─ active, non-expired assignments          │
//! │  ├─ role resolution (BFS, cycle-safe)        │
//! │  ├─ pattern match: Exact > Prefix > Any      │
//! │  └─ condition evaluation (AND within a role) │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  AccessDecision                              │
//! │  - granted / reason / restrictions           │
//! │  - masked field paths for the response       │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Decision semantics
//!
//! Roles compose by OR: one granting assignment grants, even when another
//! role explicitly denies the same (action, resource). Denial is a result
//! value — [`AccessDecision::granted`] `= false` with a reason — never an
//! error. The only error path that represents a denial is
//! [`AccessError::Denied`], raised by [`AccessEngine::filter_record`]
//! because a filtered read has nothing useful to return.

use thiserror::Error;

pub mod engine;
pub mod masking;
pub mod pattern;
pub mod roles;
pub mod store;

pub use engine::{AccessContext, AccessDecision, AccessEngine, ConditionFailure};
pub use masking::{mask_fields, MASKED_MARKER};
pub use pattern::ResourcePattern;
pub use roles::{AccessCondition, AccessRestriction, Permission, Role};
pub use store::{
    effective_permissions, resolve_role, InMemoryRoleStore, ResolvedRole, RoleAssignment,
    RoleStore,
};

/// Errors from registry mutations and filtered reads.
///
/// An ordinary "no" from the decision engine is not an error; see
/// [`AccessDecision`].
#[derive(Debug, Error)]
pub enum AccessError {
    /// The role id referenced by an assignment does not exist.
    #[error("Unknown role: {0}")]
    UnknownRole(String),

    /// A filtered read was refused. Carries the decision's reason.
    #[error("Access denied: {0}")]
    Denied(String),
}

pub type Result<T> = std::result::Result<T, AccessError>;
