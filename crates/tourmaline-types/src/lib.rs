//! # tourmaline-types: shared vocabulary for the Tourmaline core
//!
//! Defines the types every other Tourmaline crate speaks:
//! - **Sensitivity levels** ([`Sensitivity`]) — the ordered classification
//!   driving masking and audit requirements
//! - **Access actions** ([`AccessAction`]) — the closed set of operations a
//!   principal can request on a resource
//! - **Data classification** ([`classification::ClassificationTable`]) — the
//!   versioned field→sensitivity table, shipped with a default and loadable
//!   from TOML
//!
//! The classification table is data, not logic: jurisdiction-specific
//! variants are additional TOML files, never additional match arms.

use serde::{Deserialize, Serialize};

pub mod classification;

pub use classification::{ClassificationError, ClassificationTable};

// ============================================================================
// Sensitivity
// ============================================================================

/// Sensitivity classification for protected data.
///
/// Levels are ordered from least to most sensitive:
/// `Public < Internal < Confidential < HighlySensitive`.
///
/// The derived `Ord` is the ordering contract: masking, audit escalation,
/// and incident flagging all compare levels with `<`/`max`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Sensitivity {
    /// Freely disclosable data (published rates, branch addresses).
    Public,

    /// Operational data without direct personal identifiers.
    ///
    /// This is also the classification for *unknown* fields: anything the
    /// classification table has no rule for is treated as internal rather
    /// than public.
    #[default]
    Internal,

    /// Personal data whose exposure harms the data subject
    /// (contact details, birth dates, employment data).
    Confidential,

    /// Data whose exposure is a reportable incident: social security
    /// numbers, account and card numbers, health and salary records.
    ///
    /// Access at this level always requires auditing, and any audit event
    /// carrying it bypasses buffering.
    HighlySensitive,
}

impl Sensitivity {
    /// Returns whether data at this level must be encrypted at rest.
    pub fn requires_encryption(self) -> bool {
        self >= Sensitivity::Confidential
    }

    /// Returns whether access at this level always requires an audit record.
    pub fn requires_audit(self) -> bool {
        self >= Sensitivity::Confidential
    }
}

// ============================================================================
// AccessAction
// ============================================================================

/// An operation a principal can request on a resource.
///
/// This is a closed set: the decision engine matches actions exactly, and
/// the audit trail records them verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessAction {
    /// Read data from a resource.
    Read,

    /// Create or update data.
    Write,

    /// Delete data.
    ///
    /// High-risk: always audited regardless of role restrictions.
    Delete,

    /// Export data outside the system.
    ///
    /// High-risk: always audited regardless of role restrictions.
    Export,

    /// Replace sensitive values with placeholders before external handoff.
    Anonymize,

    /// Decrypt protected values, including reversing anonymization.
    ///
    /// High-risk: always audited regardless of role restrictions.
    Decrypt,
}

impl AccessAction {
    /// Returns whether this action is audited even when no role restriction
    /// demands it.
    pub fn always_audited(self) -> bool {
        matches!(
            self,
            AccessAction::Delete | AccessAction::Export | AccessAction::Decrypt
        )
    }
}

impl std::fmt::Display for AccessAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AccessAction::Read => "read",
            AccessAction::Write => "write",
            AccessAction::Delete => "delete",
            AccessAction::Export => "export",
            AccessAction::Anonymize => "anonymize",
            AccessAction::Decrypt => "decrypt",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Tests
// ============================================================================
