//! Sensitive-value detection patterns.
//!
//! The recognized categories are compiled once at construction into a
//! [`PatternSet`]; scanning never recompiles. Several categories carry
//! more than one expression (phone numbers come in local and
//! international shapes). Scan order is severity order: financial and
//! state identifiers first, so an IBAN is tokenized as an IBAN before a
//! card-number expression can claim its digits.

use crate::{AnonymizeError, Result};
use regex::Regex;

/// Category of a detected sensitive value. The category names the
/// placeholder tag (`[[SSN_1]]`) and drives validation risk grading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternCategory {
    /// Bank account numbers in IBAN form.
    Iban,
    /// Social security numbers (Swiss AHV `756.xxxx.xxxx.xx` and
    /// `ddd-dd-dddd` forms).
    SocialSecurity,
    /// Payment card numbers.
    CreditCard,
    /// Email addresses.
    Email,
    /// Phone numbers.
    Phone,
    /// Calendar dates in `dd.mm.yyyy` form (birth dates in records).
    BirthDate,
    /// Caller-registered literal values, typically person names.
    Custom,
}

impl PatternCategory {
    /// The tag used in placeholder tokens for this category.
    pub fn tag(self) -> &'static str {
        match self {
            PatternCategory::Iban => "IBAN",
            PatternCategory::SocialSecurity => "SSN",
            PatternCategory::CreditCard => "CARD",
            PatternCategory::Email => "EMAIL",
            PatternCategory::Phone => "PHONE",
            PatternCategory::BirthDate => "DOB",
            PatternCategory::Custom => "NAME",
        }
    }

    /// Categories whose residual presence in outbound text is an
    /// immediate high risk.
    pub fn is_high_severity(self) -> bool {
        matches!(
            self,
            PatternCategory::Iban | PatternCategory::SocialSecurity | PatternCategory::CreditCard
        )
    }
}

/// One compiled detection pattern.
pub struct SensitivePattern {
    pub category: PatternCategory,
    pub regex: Regex,
}

/// The compiled set of recognized sensitive-value patterns.
pub struct PatternSet {
    patterns: Vec<SensitivePattern>,
}

/// Compile an iterator of `(category, regex)` pairs.
fn compile_patterns(
    defs: impl IntoIterator<Item = (PatternCategory, &'static str)>,
) -> Result<Vec<SensitivePattern>> {
    defs.into_iter()
        .map(|(category, pattern)| {
            let regex = Regex::new(pattern).map_err(|source| AnonymizeError::Pattern {
                category: category.tag(),
                source,
            })?;
            Ok(SensitivePattern { category, regex })
        })
        .collect()
}

impl PatternSet {
    /// Compiles the default recognized set.
    pub fn standard() -> Result<Self> {
        let patterns = compile_patterns([
            // --- Financial and state identifiers (scanned first) ---
            (
                PatternCategory::Iban,
                r"\b[A-Z]{2}\d{2}(?:[ ]?\d{4}){4}(?:[ ]?\d{1,2})?\b",
            ),
            (
                PatternCategory::SocialSecurity,
                r"\b756\.\d{4}\.\d{4}\.\d{2}\b",
            ),
            (PatternCategory::SocialSecurity, r"\b\d{3}-\d{2}-\d{4}\b"),
            (
                PatternCategory::CreditCard,
                r"\b\d{4}[ -]?\d{4}[ -]?\d{4}[ -]?\d{4}\b",
            ),
            // --- Contact information ---
            (
                PatternCategory::Email,
                r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
            ),
            // International: +41 79 123 45 67
            (
                PatternCategory::Phone,
                r"\+\d{1,3}[ ]?\d{2}[ ]?\d{3}[ ]?\d{2}[ ]?\d{2}\b",
            ),
            // Local: 044 123 45 67 / 555-123-4567
            (PatternCategory::Phone, r"\b\d{3}[-. ]\d{3}[-. ]\d{2,4}\b"),
            // --- Dates ---
            (PatternCategory::BirthDate, r"\b\d{2}\.\d{2}\.\d{4}\b"),
        ])?;

        Ok(Self { patterns })
    }

    /// The compiled patterns in scan order.
    pub fn patterns(&self) -> &[SensitivePattern] {
        &self.patterns
    }

    /// Collects every distinct match of `pattern` in `text`, in first
    /// appearance order.
    pub(crate) fn distinct_matches(regex: &Regex, text: &str) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        for m in regex.find_iter(text) {
            let value = m.as_str().to_string();
            if !seen.contains(&value) {
                seen.push(value);
            }
        }
        seen
    }
}
