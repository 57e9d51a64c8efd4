//! Independent validation of outbound text.
//!
//! Validation never trusts the substitution step: it re-scans the text
//! with the full pattern set (and the instance's custom literals) and
//! reports whatever is still there. A residual high-severity identifier —
//! a social security number, an IBAN, a card number — is an immediate
//! high risk regardless of count.

use crate::patterns::PatternSet;
use crate::service::Anonymizer;
use serde::{Deserialize, Serialize};

/// Coarse risk grading for residual findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// One sensitive value found in text that should have been clean.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResidualMatch {
    /// Category tag, e.g. `"SSN"`.
    pub category: String,
    /// The matched text.
    pub value: String,
}

/// Outcome of a validation scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub residual: Vec<ResidualMatch>,
    pub risk: RiskLevel,
}

impl Anonymizer {
    /// Re-scans `text` for residual sensitive values.
    ///
    /// Returns `is_valid = true` only when nothing in the recognized set
    /// (patterns plus registered custom literals) remains.
    pub fn validate(&self, text: &str) -> ValidationReport {
        let mut residual: Vec<ResidualMatch> = Vec::new();
        let mut high_severity = false;

        for value in self.custom_values() {
            if text.contains(value.as_str()) {
                residual.push(ResidualMatch {
                    category: "NAME".to_string(),
                    value: value.clone(),
                });
            }
        }

        for pattern in self.patterns().patterns() {
            for value in PatternSet::distinct_matches(&pattern.regex, text) {
                high_severity |= pattern.category.is_high_severity();
                residual.push(ResidualMatch {
                    category: pattern.category.tag().to_string(),
                    value,
                });
            }
        }

        let risk = grade_risk(residual.len(), high_severity);
        let is_valid = residual.is_empty();

        if !is_valid {
            tracing::warn!(
                residual = residual.len(),
                ?risk,
                "validation found residual sensitive values in outbound text"
            );
        }

        ValidationReport {
            is_valid,
            residual,
            risk,
        }
    }
}

/// Risk from residual count and category severity.
fn grade_risk(count: usize, high_severity: bool) -> RiskLevel {
    if count == 0 {
        RiskLevel::Low
    } else if high_severity || count >= 3 {
        RiskLevel::High
    } else {
        RiskLevel::Medium
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymized_output_validates_clean() {
        let anonymizer = Anonymizer::new().unwrap();
        let input = "AHV 756.1234.5678.97, mail jean@example.ch, card 4111 1111 1111 1111";
        let result = anonymizer.anonymize(input, "tax_advice", "u1");

        let report = anonymizer.validate(&result.content);
        assert!(report.is_valid);
        assert!(report.residual.is_empty());
        assert_eq!(report.risk, RiskLevel::Low);
    }

    #[test]
    fn test_residual_ssn_is_high_risk() {
        let anonymizer = Anonymizer::new().unwrap();
        let report = anonymizer.validate("leaked: 756.1234.5678.97");

        assert!(!report.is_valid);
        assert_eq!(report.residual.len(), 1);
        assert_eq!(report.residual[0].category, "SSN");
        assert_eq!(report.risk, RiskLevel::High);
    }

    #[test]
    fn test_single_email_is_medium_risk() {
        let anonymizer = Anonymizer::new().unwrap();
        let report = anonymizer.validate("contact: someone@example.ch");

        assert!(!report.is_valid);
        assert_eq!(report.risk, RiskLevel::Medium);
    }

    #[test]
    fn test_many_residuals_escalate_to_high() {
        let anonymizer = Anonymizer::new().unwrap();
        let report = anonymizer.validate(
            "a@example.ch b@example.ch c@example.ch",
        );

        assert_eq!(report.residual.len(), 3);
        assert_eq!(report.risk, RiskLevel::High);
    }

    #[test]
    fn test_residual_custom_literal_detected() {
        let mut anonymizer = Anonymizer::new().unwrap();
        anonymizer.add_custom_value("Jean Dupont");

        let report = anonymizer.validate("response mentions Jean Dupont directly");
        assert!(!report.is_valid);
        assert_eq!(report.residual[0].category, "NAME");
    }

    #[test]
    fn test_clean_text_is_valid() {
        let anonymizer = Anonymizer::new().unwrap();
        let report = anonymizer.validate("[[SSN_1]] files in canton Zurich.");

        assert!(report.is_valid);
        assert_eq!(report.risk, RiskLevel::Low);
    }
}
