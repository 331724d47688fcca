//! Allowlist validation of a parsed [`FilterTree`] (spec §4.5 "Validate").
//!
//! Traversal recurses through logical nodes and checks every leaf against
//! the endpoint's [`FilterConfig`]; errors accumulate across the whole
//! tree rather than stopping at the first bad field (spec §8 property 6).

use sigma_types::{FilterConfig, FilterTree};

use crate::error::FilterError;

/// Validate `tree` against `config`, returning every violation found.
/// An empty result means the tree is fully allowed.
pub fn validate(tree: &FilterTree, config: &FilterConfig) -> Vec<FilterError> {
    if matches!(tree, FilterTree::Logical { children, .. } if children.is_empty()) {
        // The always-true empty filter never needs a configured allowlist.
        return Vec::new();
    }

    let mut errors = Vec::new();
    visit(tree, config, &mut errors);
    errors
}

/// The "filtering not enabled" rejection lives here, per leaf, rather
/// than as an upfront `!config.is_enabled()` check on the whole tree —
/// `FilterConfig::allowed_operators` already returns `Some` for `_id`
/// regardless of what's configured (spec §3 invariant), so checking
/// `is_enabled()` only in the `None` arm (fields the config truly
/// doesn't know about) is enough to let an all-`_id` tree through even
/// when the endpoint's allowlist is otherwise empty.
fn visit(tree: &FilterTree, config: &FilterConfig, errors: &mut Vec<FilterError>) {
    match tree {
        FilterTree::FieldCond { field, op, .. } => match config.allowed_operators(field) {
            None => {
                if config.is_enabled() {
                    errors.push(FilterError::FieldNotAllowed(field.clone()));
                } else {
                    errors.push(FilterError::FilteringNotEnabled);
                }
            }
            Some(allowed) => {
                if !allowed.contains(op) {
                    errors.push(FilterError::OperatorNotAllowed {
                        field: field.clone(),
                        operator: op.wire_token().to_string(),
                    });
                }
            }
        },
        FilterTree::Logical { children, .. } => {
            for child in children {
                visit(child, config, errors);
            }
        }
        FilterTree::Not { child } => visit(child, config, errors),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigma_types::Operator;
    use std::collections::{BTreeSet, HashMap};

    fn config(fields: &[(&str, &[Operator])]) -> FilterConfig {
        FilterConfig {
            fields: fields
                .iter()
                .map(|(name, ops)| (name.to_string(), ops.iter().copied().collect::<BTreeSet<_>>()))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn disabled_config_rejects_everything_with_one_error() {
        let tree = FilterTree::FieldCond {
            field: "price".to_string(),
            op: Operator::Eq,
            value: serde_json::json!(1),
        };
        let errors = validate(&tree, &FilterConfig::default());
        assert_eq!(errors, vec![FilterError::FilteringNotEnabled]);
    }

    #[test]
    fn validation_is_exhaustive_across_many_bad_leaves() {
        let tree = FilterTree::Logical {
            op: sigma_types::LogicalOp::And,
            children: vec![
                FilterTree::FieldCond { field: "a".into(), op: Operator::Eq, value: serde_json::json!(1) },
                FilterTree::FieldCond { field: "b".into(), op: Operator::Regex, value: serde_json::json!("x") },
                FilterTree::FieldCond { field: "price".into(), op: Operator::Regex, value: serde_json::json!("x") },
            ],
        };
        let cfg = config(&[("price", &[Operator::Eq, Operator::Gte, Operator::Lte])]);
        let errors = validate(&tree, &cfg);
        // "a" and "b" are not allowed fields at all; "price" disallows regex.
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn id_equality_passes_even_with_a_non_empty_config_that_omits_it() {
        let tree = FilterTree::FieldCond {
            field: "_id".to_string(),
            op: Operator::Eq,
            value: serde_json::json!("1"),
        };
        let cfg = config(&[("price", &[Operator::Eq])]);
        assert!(validate(&tree, &cfg).is_empty());
    }

    #[test]
    fn id_equality_passes_even_with_a_completely_empty_config() {
        let tree = FilterTree::FieldCond {
            field: "_id".to_string(),
            op: Operator::Eq,
            value: serde_json::json!("1"),
        };
        let errors = validate(&tree, &FilterConfig::default());
        assert!(errors.is_empty());
    }

    #[test]
    fn non_id_field_still_rejected_as_not_enabled_when_config_is_empty() {
        let tree = FilterTree::FieldCond { field: "price".to_string(), op: Operator::Eq, value: serde_json::json!(1) };
        let errors = validate(&tree, &FilterConfig::default());
        assert_eq!(errors, vec![FilterError::FilteringNotEnabled]);
    }
}
