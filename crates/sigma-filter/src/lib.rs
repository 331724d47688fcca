#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **sigma-filter** – Filter parsing, allowlist validation, and SQL
//! translation for the Sigma data gateway (spec §4.5 "Filter pipeline").
//!
//! The pipeline is strictly staged: parse the wire JSON into a
//! [`sigma_types::FilterTree`], validate every leaf against the
//! endpoint's configured allowlist, then translate the validated tree
//! into a dialect-specific `WHERE` fragment. Each stage is independently
//! testable and the parse/validate stages never short-circuit — every
//! offending entry in a request is reported together.

mod column;
mod error;
mod operators;
mod options;
mod parse;
mod translate;
mod validate;

pub use error::FilterError;
pub use operators::{Binder, OperatorRegistry, OperatorStrategy};
pub use options::{
    parse_pagination_number, parse_projection, parse_sort, split_reserved_options, ReadOptions,
};
pub use parse::parse_filter_map;
pub use translate::{translate, FilterResult};
pub use validate::validate;

use serde_json::Map;
use serde_json::Value;
use sigma_dialect::SqlDialect;
use sigma_types::FilterConfig;

/// Parse, validate, and translate a filter map in one call — the shape
/// every request handler in `sigma-gateway` actually needs.
///
/// `starting_index` lets the caller reserve earlier placeholders (e.g.
/// a `table_name = $1` equality the repository always prepends).
pub fn build_filter(
    filter_map: &Map<String, Value>,
    config: &FilterConfig,
    dialect: &dyn SqlDialect,
    registry: &OperatorRegistry,
    starting_index: usize,
) -> Result<FilterResult, Vec<FilterError>> {
    let tree = parse_filter_map(filter_map)?;

    let violations = validate(&tree, config);
    if !violations.is_empty() {
        return Err(violations);
    }

    translate(&tree, dialect, registry, starting_index).map_err(|e| vec![e])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sigma_dialect::PostgresDialect;
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
    fn end_to_end_builds_a_where_clause_for_an_allowed_field() {
        let map = json!({"status": {"$eq": "active"}}).as_object().unwrap().clone();
        let cfg = config(&[("status", &[Operator::Eq])]);
        let dialect = PostgresDialect::default();
        let registry = OperatorRegistry::default();
        let result = build_filter(&map, &cfg, &dialect, &registry, 1).unwrap();
        assert_eq!(result.where_clause, "data #>> '{status}' = $1");
    }

    #[test]
    fn end_to_end_rejects_a_field_outside_the_allowlist() {
        let map = json!({"secret": "x"}).as_object().unwrap().clone();
        let cfg = config(&[("status", &[Operator::Eq])]);
        let dialect = PostgresDialect::default();
        let registry = OperatorRegistry::default();
        let errors = build_filter(&map, &cfg, &dialect, &registry, 1).unwrap_err();
        assert_eq!(errors, vec![FilterError::FieldNotAllowed("secret".to_string())]);
    }

    #[test]
    fn empty_filter_map_builds_an_always_true_clause_without_an_allowlist() {
        let map = Map::new();
        let cfg = FilterConfig::default();
        let dialect = PostgresDialect::default();
        let registry = OperatorRegistry::default();
        let result = build_filter(&map, &cfg, &dialect, &registry, 1).unwrap();
        assert_eq!(result.where_clause, "TRUE");
        assert!(result.params.is_empty());
    }
}
