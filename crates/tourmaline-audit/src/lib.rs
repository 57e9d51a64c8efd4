//! # tourmaline-audit: the tamper-resistant trail
//!
//! Records every security-relevant event, buffers and flushes them to an
//! injectable [`AuditSink`], detects suspicious access patterns, answers
//! queries with aggregate statistics, and tracks data-breach incidents
//! through their lifecycle.
//!
//! ## Architecture
//!
//! ```text
//! log_event(draft)
//!     │ validate (required fields, closed enums)
//!     ▼
//! ┌──────────────────────────────────────────────┐
//! │  AuditTrail                                   │
//! │  ├─ retained log (queryable, retention-bound) │
//! │  ├─ buffer ──▶ flush ──▶ AuditSink            │
//! │  │      critical events flush immediately     │
//! │  └─ detectors: denial bursts, after-hours     │
//! │        access to highly sensitive data        │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - A malformed event is rejected synchronously; nothing is partially
//!   recorded.
//! - Flush drains the buffer atomically; on sink failure the drained
//!   events are restored at the front — no loss, no duplication.
//! - Detection synthesizes its incident events with `result = Failure`,
//!   so the detector can never re-trigger on its own output.

use thiserror::Error;

pub mod breach;
pub mod event;
pub mod query;
pub mod report;
pub mod sink;
pub mod trail;

pub use breach::{BreachError, BreachEvent, BreachLog, BreachReport, BreachSeverity, BreachStatus};
pub use event::{AuditAction, AuditEvent, AuditEventDraft, AuditResult};
pub use query::{AuditQuery, AuditStatistics, QueryOutcome};
pub use report::{AuditReport, SuspiciousEntry, SuspiciousKind};
pub use sink::{AuditSink, MemorySink, SinkError};
pub use trail::{AuditConfig, AuditTrail};

/// Errors from logging and flushing.
///
/// Validation and persistence failures are distinct so callers can decide
/// whether a retry makes sense: a validation failure never will, a
/// persistence failure might.
#[derive(Debug, Error)]
pub enum AuditError {
    /// A required event field was missing or empty. Nothing was recorded.
    #[error("Invalid audit event: missing required field '{field}'")]
    Validation { field: &'static str },

    /// The sink rejected a flush. The buffered events were restored.
    #[error(transparent)]
    Persistence(#[from] SinkError),
}

pub type Result<T> = std::result::Result<T, AuditError>;
