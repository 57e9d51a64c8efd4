//! # tourmaline-anonymize: reversible anonymization for LLM handoff
//!
//! Replaces sensitive values in text with opaque, category-tagged
//! placeholders before the text leaves the trust boundary, and validates
//! that nothing sensitive leaks back out.
//!
//! ```text
//! "Jean Dupont, AHV 756.1234.5678.97"
//!          │ anonymize
//!          ▼
//! "[[NAME_1]], AHV [[SSN_1]]"   +   AnonymizationContext
//!          │ ... external text generation ...
//!          ▼
//! deanonymize(output, context) ⇒ originals restored
//! ```
//!
//! ## Contracts
//!
//! - **Determinism**: the same literal value occurring twice in one
//!   invocation maps to the same placeholder, preserving referential
//!   meaning for the external collaborator.
//! - **Independence**: [`Anonymizer::validate`] re-scans output with the
//!   full pattern set; it never trusts that substitution worked.
//! - **Scope**: an [`AnonymizationContext`] is call-scoped, TTL-bounded,
//!   and never persisted unmasked beyond its expiry.

use thiserror::Error;

pub mod context;
pub mod patterns;
pub mod service;
pub mod validate;

pub use context::AnonymizationContext;
pub use patterns::{PatternCategory, PatternSet};
pub use service::{AnonymizedContent, Anonymizer};
pub use validate::{ResidualMatch, RiskLevel, ValidationReport};

#[derive(Debug, Error)]
pub enum AnonymizeError {
    /// A detection pattern failed to compile.
    #[error("Failed to compile pattern for {category}: {source}")]
    Pattern {
        category: &'static str,
        #[source]
        source: regex::Error,
    },

    /// The context's TTL has passed; its token map may no longer be used.
    #[error("Anonymization context {0} has expired")]
    ContextExpired(uuid::Uuid),
}

pub type Result<T> = std::result::Result<T, AnonymizeError>;
