//! The anonymization service.
//!
//! [`Anonymizer::anonymize`] scans content against the recognized pattern
//! set and any registered custom literals, replacing each distinct
//! sensitive value with a category-tagged placeholder. The token mapping
//! lives in the returned [`AnonymizationContext`];
//! [`Anonymizer::deanonymize`] reverses it while the context is live.
//!
//! Reverse lookup is a highly sensitive operation: the caller is expected
//! to gate it through the access decision engine and audit every use.
//! That wiring lives in the facade crate, not here.

use crate::context::AnonymizationContext;
use crate::patterns::{PatternCategory, PatternSet};
use crate::{AnonymizeError, Result};
use chrono::{Duration, Utc};

/// Result of one anonymization pass.
#[derive(Debug)]
pub struct AnonymizedContent {
    /// The transformed text, safe for external handoff.
    pub content: String,
    /// Distinct placeholders minted.
    pub placeholder_count: usize,
    /// The token mapping; required for de-anonymization, TTL-bounded.
    pub context: AnonymizationContext,
}

/// Scans and transforms text bound for an external text-generation
/// collaborator.
pub struct Anonymizer {
    patterns: PatternSet,
    /// Literal values (typically names) registered for this instance.
    custom_values: Vec<String>,
    context_ttl: Duration,
}

impl Anonymizer {
    /// Creates an anonymizer with the standard pattern set and a
    /// 15-minute context TTL.
    pub fn new() -> Result<Self> {
        Ok(Self {
            patterns: PatternSet::standard()?,
            custom_values: Vec::new(),
            context_ttl: Duration::minutes(15),
        })
    }

    /// Overrides the context TTL (builder pattern).
    pub fn with_context_ttl(mut self, ttl: Duration) -> Self {
        self.context_ttl = ttl;
        self
    }

    /// Registers a literal value to redact, e.g. the record owner's name.
    /// Values shorter than 3 characters are ignored: replacing them would
    /// mangle unrelated text.
    pub fn add_custom_value(&mut self, value: &str) {
        let value = value.trim();
        if value.len() >= 3 && !self.custom_values.iter().any(|v| v == value) {
            self.custom_values.push(value.to_string());
        }
    }

    /// Anonymizes `content` for the given owner and purpose.
    ///
    /// Custom literals are replaced first, then each pattern category in
    /// severity order. Every distinct sensitive value maps to exactly one
    /// placeholder; repeated occurrences reuse it.
    pub fn anonymize(
        &self,
        content: &str,
        purpose: &str,
        owner_user_id: &str,
    ) -> AnonymizedContent {
        let mut context = AnonymizationContext::new(owner_user_id, purpose, self.context_ttl);
        let mut text = content.to_string();

        for value in &self.custom_values {
            if text.contains(value.as_str()) {
                let token = context.token_for(PatternCategory::Custom.tag(), value);
                text = text.replace(value.as_str(), &token);
            }
        }

        for pattern in self.patterns.patterns() {
            for value in PatternSet::distinct_matches(&pattern.regex, &text) {
                let token = context.token_for(pattern.category.tag(), &value);
                text = text.replace(value.as_str(), &token);
            }
        }

        let placeholder_count = context.placeholder_count();
        tracing::debug!(
            owner = %owner_user_id,
            purpose = %purpose,
            placeholder_count,
            "content anonymized for external handoff"
        );

        AnonymizedContent {
            content: text,
            placeholder_count,
            context,
        }
    }

    /// Restores original values in `text` using the invocation's context.
    ///
    /// # Errors
    ///
    /// [`AnonymizeError::ContextExpired`] once the context TTL has
    /// passed; the mapping may no longer be used.
    pub fn deanonymize(&self, text: &str, context: &AnonymizationContext) -> Result<String> {
        if context.is_expired(Utc::now()) {
            return Err(AnonymizeError::ContextExpired(context.id));
        }

        let mut restored = text.to_string();
        for (token, original) in context.entries() {
            restored = restored.replace(token, original);
        }
        Ok(restored)
    }

    pub(crate) fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    pub(crate) fn custom_values(&self) -> &[String] {
        &self.custom_values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_anonymize_replaces_known_categories() {
        let anonymizer = Anonymizer::new().unwrap();
        let input = "AHV 756.1234.5678.97, IBAN CH93 0076 2011 6238 5295 7, \
                     mail jean.dupont@example.ch";

        let result = anonymizer.anonymize(input, "tax_advice", "u1");

        assert!(!result.content.contains("756.1234.5678.97"));
        assert!(!result.content.contains("CH93"));
        assert!(!result.content.contains("jean.dupont@example.ch"));
        assert!(result.content.contains("[[SSN_1]]"));
        assert!(result.content.contains("[[IBAN_1]]"));
        assert!(result.content.contains("[[EMAIL_1]]"));
        assert_eq!(result.placeholder_count, 3);
    }

    #[test]
    fn test_repeated_value_reuses_placeholder() {
        let anonymizer = Anonymizer::new().unwrap();
        let input = "Send to a@example.ch; confirm a@example.ch received it.";

        let result = anonymizer.anonymize(input, "correspondence", "u1");

        assert_eq!(result.placeholder_count, 1);
        assert_eq!(result.content.matches("[[EMAIL_1]]").count(), 2);
    }

    #[test]
    fn test_custom_values_masked_first() {
        let mut anonymizer = Anonymizer::new().unwrap();
        anonymizer.add_custom_value("Jean Dupont");

        let result = anonymizer.anonymize(
            "Client Jean Dupont called about Jean Dupont's statement.",
            "support",
            "u1",
        );

        assert!(!result.content.contains("Jean Dupont"));
        assert_eq!(result.content.matches("[[NAME_1]]").count(), 2);
    }

    #[test]
    fn test_short_custom_values_ignored() {
        let mut anonymizer = Anonymizer::new().unwrap();
        anonymizer.add_custom_value("JD");
        anonymizer.add_custom_value("  ");

        let result = anonymizer.anonymize("JD wrote in", "support", "u1");
        assert_eq!(result.content, "JD wrote in");
    }

    #[test]
    fn test_roundtrip_recovers_original() {
        let mut anonymizer = Anonymizer::new().unwrap();
        anonymizer.add_custom_value("Jean Dupont");

        let input = "Jean Dupont, AHV 756.1234.5678.97, phone +41 79 123 45 67, \
                     writes from jean@example.ch about IBAN CH93 0076 2011 6238 5295 7.";
        let result = anonymizer.anonymize(input, "tax_advice", "u1");
        let restored = anonymizer
            .deanonymize(&result.content, &result.context)
            .unwrap();

        assert_eq!(restored, input);
    }

    #[test]
    fn test_deanonymize_expired_context_rejected() {
        let anonymizer = Anonymizer::new().unwrap().with_context_ttl(Duration::seconds(-1));
        let result = anonymizer.anonymize("mail a@example.ch", "support", "u1");

        let outcome = anonymizer.deanonymize(&result.content, &result.context);
        assert!(matches!(outcome, Err(AnonymizeError::ContextExpired(_))));
    }

    #[test]
    fn test_context_records_owner_and_purpose() {
        let anonymizer = Anonymizer::new().unwrap();
        let result = anonymizer.anonymize("a@example.ch", "tax_advice", "u42");

        assert_eq!(result.context.owner_user_id, "u42");
        assert_eq!(result.context.purpose, "tax_advice");
    }

    #[test]
    fn test_clean_text_untouched() {
        let anonymizer = Anonymizer::new().unwrap();
        let input = "The standard deduction for canton Zurich applies.";
        let result = anonymizer.anonymize(input, "tax_advice", "u1");

        assert_eq!(result.content, input);
        assert_eq!(result.placeholder_count, 0);
    }

    proptest! {
        /// Round-trip holds for arbitrary prose around a known sensitive
        /// value, as long as the prose itself contains no placeholder
        /// syntax or other sensitive patterns.
        #[test]
        fn prop_roundtrip(prefix in "[a-z ]{0,20}", suffix in "[a-z ]{0,20}") {
            let anonymizer = Anonymizer::new().unwrap();
            let input = format!("{prefix}756.1234.5678.97{suffix}");
            let result = anonymizer.anonymize(&input, "p", "u");
            let restored = anonymizer.deanonymize(&result.content, &result.context).unwrap();
            prop_assert_eq!(restored, input);
        }
    }
}
