//! Field masking over dynamic records.
//!
//! Redacts field paths from a [`serde_json::Value`] tree before it leaves
//! the core. Masking is a pure function: the input is never mutated, and
//! the result is a fresh tree with every targeted leaf replaced by
//! [`MASKED_MARKER`].
//!
//! Paths are dot-separated. A `*` segment applies the remaining path to
//! every element of an array: `accounts.*.iban` masks the `iban` field of
//! each entry in `accounts`. Paths that do not exist in the record are
//! ignored — masking removes information, it never invents structure.

use serde_json::Value;

/// The constant every masked leaf is replaced with.
pub const MASKED_MARKER: &str = "[MASKED]";

/// Returns a copy of `data` with every path in `paths` redacted.
pub fn mask_fields<S: AsRef<str>>(data: &Value, paths: &[S]) -> Value {
    let mut out = data.clone();
    for path in paths {
        let segments: Vec<&str> = path.as_ref().split('.').collect();
        if !segments.is_empty() {
            apply_mask(&mut out, &segments);
        }
    }
    out
}

/// Walks one path into the tree, replacing the addressed leaf.
fn apply_mask(value: &mut Value, segments: &[&str]) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };

    if *head == "*" {
        // Wildcard: apply to every array element.
        if let Value::Array(items) = value {
            for item in items {
                if rest.is_empty() {
                    *item = Value::String(MASKED_MARKER.to_string());
                } else {
                    apply_mask(item, rest);
                }
            }
        }
        return;
    }

    if let Value::Object(map) = value {
        if let Some(child) = map.get_mut(*head) {
            if rest.is_empty() {
                *child = Value::String(MASKED_MARKER.to_string());
            } else {
                apply_mask(child, rest);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_masks_nested_leaf() {
        let data = json!({
            "personal_info": {"ssn": "756.1234.5678.97", "name": "Jean"}
        });

        let masked = mask_fields(&data, &["personal_info.ssn"]);

        assert_eq!(
            masked,
            json!({"personal_info": {"ssn": "[MASKED]", "name": "Jean"}})
        );
    }

    #[test]
    fn test_input_not_mutated() {
        let data = json!({"ssn": "756.1234.5678.97"});
        let _ = mask_fields(&data, &["ssn"]);
        assert_eq!(data["ssn"], "756.1234.5678.97");
    }

    #[test]
    fn test_wildcard_masks_every_array_element_field() {
        let data = json!({
            "accounts": [
                {"iban": "CH93 0076 2011 6238 5295 7", "label": "main"},
                {"iban": "CH56 0483 5012 3456 7800 9", "label": "savings"}
            ]
        });

        let masked = mask_fields(&data, &["accounts.*.iban"]);

        assert_eq!(masked["accounts"][0]["iban"], "[MASKED]");
        assert_eq!(masked["accounts"][1]["iban"], "[MASKED]");
        assert_eq!(masked["accounts"][0]["label"], "main");
    }

    #[test]
    fn test_trailing_wildcard_masks_whole_elements() {
        let data = json!({"tags": ["vip", "priority"]});
        let masked = mask_fields(&data, &["tags.*"]);
        assert_eq!(masked["tags"], json!(["[MASKED]", "[MASKED]"]));
    }

    #[test]
    fn test_missing_path_is_ignored() {
        let data = json!({"name": "Jean"});
        let masked = mask_fields(&data, &["personal_info.ssn", "salary"]);
        assert_eq!(masked, data);
    }

    #[test]
    fn test_wildcard_on_non_array_is_ignored() {
        let data = json!({"accounts": {"iban": "CH93"}});
        let masked = mask_fields(&data, &["accounts.*.iban"]);
        assert_eq!(masked, data);
    }

    #[test]
    fn test_multiple_paths() {
        let data = json!({
            "personal_info": {"ssn": "756.1234.5678.97", "email": "jean@example.ch"},
            "salary": 125_000
        });

        let masked = mask_fields(&data, &["personal_info.ssn", "salary"]);

        assert_eq!(masked["personal_info"]["ssn"], "[MASKED]");
        assert_eq!(masked["salary"], "[MASKED]");
        assert_eq!(masked["personal_info"]["email"], "jean@example.ch");
    }

    #[test]
    fn test_masks_non_string_leaves() {
        let data = json!({"balance": 42_000.5, "flags": {"vip": true}});
        let masked = mask_fields(&data, &["balance", "flags.vip"]);
        assert_eq!(masked["balance"], "[MASKED]");
        assert_eq!(masked["flags"]["vip"], "[MASKED]");
    }

    proptest! {
        /// Masking never changes the input value.
        #[test]
        fn prop_input_unchanged(
            key in "[a-z]{1,8}",
            val in "[a-zA-Z0-9 ]{0,20}",
        ) {
            let mut map = serde_json::Map::new();
            map.insert(key.clone(), Value::String(val));
            let data = Value::Object(map);
            let snapshot = data.clone();
            let _ = mask_fields(&data, &[key.as_str()]);
            prop_assert_eq!(data, snapshot);
        }

        /// A masked path either becomes the marker or was absent.
        #[test]
        fn prop_masked_or_absent(
            present in any::<bool>(),
            val in "[a-zA-Z0-9]{0,12}",
        ) {
            let data = if present {
                json!({"target": val})
            } else {
                json!({"other": val})
            };
            let masked = mask_fields(&data, &["target"]);
            if present {
                prop_assert_eq!(&masked["target"], &json!(MASKED_MARKER));
            } else {
                prop_assert_eq!(masked, data);
            }
        }
    }
}
