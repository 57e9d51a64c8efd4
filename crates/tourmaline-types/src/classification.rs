//! Field-level data classification.
//!
//! Maps field names to [`Sensitivity`] levels through a versioned rule
//! table. The table ships with a built-in default covering the common
//! personal/financial fields and can be replaced wholesale from TOML, so
//! jurisdiction-specific classifications live in configuration rather than
//! in code.
//!
//! Classification is by field-name suffix: the rule `ssn` matches both
//! `ssn` and `personal_info.ssn`. When several rules match, the most
//! specific (longest) suffix wins. Fields with no matching rule classify
//! as [`Sensitivity::Internal`] — unknown data is never treated as public.

use crate::Sensitivity;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error("Failed to parse classification table: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Classification table has no rules")]
    EmptyTable,
}

pub type Result<T> = std::result::Result<T, ClassificationError>;

/// A single classification rule: field-name suffix → sensitivity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRule {
    /// Field-name suffix to match, compared case-insensitively against the
    /// final path segment of the field (`personal_info.ssn` matches `ssn`).
    pub field: String,
    /// The sensitivity assigned to matching fields.
    pub sensitivity: Sensitivity,
}

/// Versioned field→sensitivity classification table.
///
/// # Example
///
/// ```
/// use tourmaline_types::{ClassificationTable, Sensitivity};
///
/// let table = ClassificationTable::default();
/// assert_eq!(table.classify("personal_info.ssn"), Sensitivity::HighlySensitive);
/// assert_eq!(table.classify("favourite_colour"), Sensitivity::Internal);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationTable {
    /// Version tag of the table, recorded in audit metadata.
    pub version: String,
    rules: Vec<ClassificationRule>,
}

impl Default for ClassificationTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ClassificationTable {
    /// Returns the built-in default table for personal/financial records.
    pub fn builtin() -> Self {
        let rule = |field: &str, sensitivity: Sensitivity| ClassificationRule {
            field: field.to_string(),
            sensitivity,
        };

        Self {
            version: "builtin-1".to_string(),
            rules: vec![
                // Identifiers whose exposure is a reportable incident
                rule("ssn", Sensitivity::HighlySensitive),
                rule("social_security_number", Sensitivity::HighlySensitive),
                rule("iban", Sensitivity::HighlySensitive),
                rule("account_number", Sensitivity::HighlySensitive),
                rule("card_number", Sensitivity::HighlySensitive),
                rule("tax_id", Sensitivity::HighlySensitive),
                rule("salary", Sensitivity::HighlySensitive),
                rule("income", Sensitivity::HighlySensitive),
                rule("health_record", Sensitivity::HighlySensitive),
                // Personal data
                rule("email", Sensitivity::Confidential),
                rule("phone", Sensitivity::Confidential),
                rule("address", Sensitivity::Confidential),
                rule("date_of_birth", Sensitivity::Confidential),
                rule("first_name", Sensitivity::Confidential),
                rule("last_name", Sensitivity::Confidential),
                rule("employer", Sensitivity::Confidential),
                // Operational data
                rule("user_id", Sensitivity::Internal),
                rule("created_at", Sensitivity::Internal),
                rule("updated_at", Sensitivity::Internal),
                // Published data
                rule("currency", Sensitivity::Public),
                rule("country", Sensitivity::Public),
            ],
        }
    }

    /// Parses a classification table from TOML.
    ///
    /// Expected shape:
    ///
    /// ```toml
    /// version = "ch-2026-01"
    ///
    /// [[rules]]
    /// field = "ahv_number"
    /// sensitivity = "highly_sensitive"
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ClassificationError::Parse`] on malformed TOML and
    /// [`ClassificationError::EmptyTable`] when no rules are present: an
    /// empty table would silently classify everything as `Internal`, which
    /// is almost certainly a configuration mistake.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let table: Self = toml::from_str(input)?;
        if table.rules.is_empty() {
            return Err(ClassificationError::EmptyTable);
        }
        Ok(table)
    }

    /// Classifies a single field path.
    ///
    /// Matches the final path segment case-insensitively against each rule
    /// suffix; the longest matching suffix wins. Unmatched fields classify
    /// as [`Sensitivity::Internal`].
    pub fn classify(&self, field_path: &str) -> Sensitivity {
        let leaf = field_path
            .rsplit('.')
            .next()
            .unwrap_or(field_path)
            .to_ascii_lowercase();

        self.rules
            .iter()
            .filter(|r| {
                let suffix = r.field.to_ascii_lowercase();
                leaf == suffix || leaf.ends_with(&suffix)
            })
            .max_by_key(|r| r.field.len())
            .map_or(Sensitivity::Internal, |r| r.sensitivity)
    }

    /// Returns the maximum sensitivity across a set of field paths.
    ///
    /// An empty set classifies as `Internal`, matching the unknown-field
    /// rule.
    pub fn max_sensitivity<I, S>(&self, fields: I) -> Sensitivity
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        fields
            .into_iter()
            .map(|f| self.classify(f.as_ref()))
            .max()
            .unwrap_or(Sensitivity::Internal)
    }

    /// Returns the rules in this table.
    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_classifications() {
        let table = ClassificationTable::default();

        assert_eq!(table.classify("ssn"), Sensitivity::HighlySensitive);
        assert_eq!(table.classify("iban"), Sensitivity::HighlySensitive);
        assert_eq!(table.classify("email"), Sensitivity::Confidential);
        assert_eq!(table.classify("user_id"), Sensitivity::Internal);
        assert_eq!(table.classify("currency"), Sensitivity::Public);
    }

    #[test]
    fn test_nested_path_uses_leaf_segment() {
        let table = ClassificationTable::default();

        assert_eq!(
            table.classify("personal_info.ssn"),
            Sensitivity::HighlySensitive
        );
        assert_eq!(
            table.classify("contact.details.email"),
            Sensitivity::Confidential
        );
    }

    #[test]
    fn test_unknown_field_is_internal() {
        let table = ClassificationTable::default();
        assert_eq!(table.classify("favourite_colour"), Sensitivity::Internal);
    }

    #[test]
    fn test_case_insensitive_match() {
        let table = ClassificationTable::default();
        assert_eq!(table.classify("IBAN"), Sensitivity::HighlySensitive);
        assert_eq!(table.classify("Email"), Sensitivity::Confidential);
    }

    #[test]
    fn test_longest_suffix_wins() {
        let toml = r#"
            version = "test"

            [[rules]]
            field = "number"
            sensitivity = "internal"

            [[rules]]
            field = "card_number"
            sensitivity = "highly_sensitive"
        "#;
        let table = ClassificationTable::from_toml_str(toml).unwrap();

        assert_eq!(table.classify("card_number"), Sensitivity::HighlySensitive);
        assert_eq!(table.classify("sequence_number"), Sensitivity::Internal);
    }

    #[test]
    fn test_max_sensitivity() {
        let table = ClassificationTable::default();

        let fields = ["first_name", "ssn", "user_id"];
        assert_eq!(
            table.max_sensitivity(fields),
            Sensitivity::HighlySensitive
        );

        let fields = ["user_id", "created_at"];
        assert_eq!(table.max_sensitivity(fields), Sensitivity::Internal);

        let empty: [&str; 0] = [];
        assert_eq!(table.max_sensitivity(empty), Sensitivity::Internal);
    }

    #[test]
    fn test_from_toml_str() {
        let toml = r#"
            version = "ch-2026-01"

            [[rules]]
            field = "ahv_number"
            sensitivity = "highly_sensitive"

            [[rules]]
            field = "canton"
            sensitivity = "public"
        "#;
        let table = ClassificationTable::from_toml_str(toml).unwrap();

        assert_eq!(table.version, "ch-2026-01");
        assert_eq!(table.classify("ahv_number"), Sensitivity::HighlySensitive);
        assert_eq!(table.classify("canton"), Sensitivity::Public);
        // Built-in rules are replaced, not merged
        assert_eq!(table.classify("iban"), Sensitivity::Internal);
    }

    #[test]
    fn test_empty_table_rejected() {
        let toml = r#"
            version = "empty"
            rules = []
        "#;
        let result = ClassificationTable::from_toml_str(toml);
        assert!(matches!(result, Err(ClassificationError::EmptyTable)));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        let result = ClassificationTable::from_toml_str("not valid [ toml");
        assert!(matches!(result, Err(ClassificationError::Parse(_))));
    }
}
