//! Resource patterns.
//!
//! A protected resource is addressed by a dotted path such as
//! `tax_profile.own`. Permissions reference resources through a closed
//! pattern type resolved once at role-load time, not re-parsed per call.
//!
//! Matching precedence is a deterministic contract: an exact match beats a
//! prefix wildcard, which beats the global wildcard. The engine relies on
//! this ordering when a role carries several patterns matching the same
//! resource.

use serde::{Deserialize, Serialize};

/// A resource pattern: exact path, prefix wildcard, or match-all.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResourcePattern {
    /// Matches exactly one resource path.
    Exact(String),
    /// `"x.*"` — matches any resource starting with `"x."`.
    /// The stored string includes the trailing dot.
    Prefix(String),
    /// `"*"` — matches every resource.
    Any,
}

impl ResourcePattern {
    /// Parses the string form: `"*"`, `"prefix.*"`, or an exact path.
    pub fn parse(s: &str) -> Self {
        if s == "*" {
            ResourcePattern::Any
        } else if let Some(prefix) = s.strip_suffix(".*") {
            ResourcePattern::Prefix(format!("{prefix}."))
        } else {
            ResourcePattern::Exact(s.to_string())
        }
    }

    /// Returns whether this pattern matches the given resource path.
    ///
    /// A pure function of (pattern, resource); repeated evaluation yields
    /// identical results regardless of call order.
    pub fn matches(&self, resource: &str) -> bool {
        match self {
            ResourcePattern::Exact(path) => path == resource,
            ResourcePattern::Prefix(prefix) => resource.starts_with(prefix.as_str()),
            ResourcePattern::Any => true,
        }
    }

    /// Match precedence: lower is more specific. Exact (0) beats
    /// Prefix (1) beats Any (2).
    pub fn precedence(&self) -> u8 {
        match self {
            ResourcePattern::Exact(_) => 0,
            ResourcePattern::Prefix(_) => 1,
            ResourcePattern::Any => 2,
        }
    }
}

impl From<String> for ResourcePattern {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<ResourcePattern> for String {
    fn from(p: ResourcePattern) -> Self {
        p.to_string()
    }
}

impl std::fmt::Display for ResourcePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourcePattern::Exact(path) => f.write_str(path),
            ResourcePattern::Prefix(prefix) => write!(f, "{prefix}*"),
            ResourcePattern::Any => f.write_str("*"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_forms() {
        assert_eq!(ResourcePattern::parse("*"), ResourcePattern::Any);
        assert_eq!(
            ResourcePattern::parse("tax_profile.*"),
            ResourcePattern::Prefix("tax_profile.".to_string())
        );
        assert_eq!(
            ResourcePattern::parse("tax_profile.own"),
            ResourcePattern::Exact("tax_profile.own".to_string())
        );
    }

    #[test]
    fn test_exact_match() {
        let p = ResourcePattern::parse("tax_profile.own");
        assert!(p.matches("tax_profile.own"));
        assert!(!p.matches("tax_profile.other"));
        assert!(!p.matches("tax_profile"));
    }

    #[test]
    fn test_prefix_match_requires_dot() {
        let p = ResourcePattern::parse("tax_profile.*");
        assert!(p.matches("tax_profile.own"));
        assert!(p.matches("tax_profile.own.deductions"));
        // "tax_profile" itself does not start with "tax_profile."
        assert!(!p.matches("tax_profile"));
        // "tax_profiles.x" does not start with "tax_profile."
        assert!(!p.matches("tax_profiles.x"));
    }

    #[test]
    fn test_any_matches_everything() {
        let p = ResourcePattern::parse("*");
        assert!(p.matches("tax_profile.own"));
        assert!(p.matches(""));
        assert!(p.matches("anything"));
    }

    #[test]
    fn test_precedence_ordering() {
        assert!(
            ResourcePattern::parse("a.b").precedence()
                < ResourcePattern::parse("a.*").precedence()
        );
        assert!(
            ResourcePattern::parse("a.*").precedence() < ResourcePattern::parse("*").precedence()
        );
    }

    #[test]
    fn test_display_roundtrip() {
        for s in ["*", "tax_profile.*", "tax_profile.own"] {
            assert_eq!(ResourcePattern::parse(s).to_string(), s);
        }
    }

    proptest! {
        /// Matching is a pure function: the same (pattern, resource) pair
        /// always evaluates the same way.
        #[test]
        fn prop_match_is_deterministic(
            pattern in "[a-z_.]{0,20}(\\.\\*)?",
            resource in "[a-z_.]{0,20}",
        ) {
            let p = ResourcePattern::parse(&pattern);
            let first = p.matches(&resource);
            for _ in 0..10 {
                prop_assert_eq!(p.matches(&resource), first);
            }
        }

        /// Parsing then displaying then re-parsing is stable.
        #[test]
        fn prop_parse_display_stable(pattern in "[a-z_]{1,10}(\\.[a-z_]{1,10}){0,3}(\\.\\*)?") {
            let p = ResourcePattern::parse(&pattern);
            let reparsed = ResourcePattern::parse(&p.to_string());
            prop_assert_eq!(p, reparsed);
        }
    }
}
