//! Parsing of the reserved query options that ride alongside a filter:
//! `sort`, `limit`, `skip`, `projection` (spec §4.4 "Read options").

use serde_json::{Map, Value};
use sigma_types::{ProjectionSpec, SortOrder, SortSpec};

use crate::error::FilterError;

/// Parsed read options. All fields are optional; a request with none of
/// them reads the full, unsorted, unprojected result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadOptions {
    /// Field ordering, applied in map iteration order (insertion order,
    /// since `SortSpec` is an `IndexMap`).
    pub sort: Option<SortSpec>,
    /// Maximum rows to return.
    pub limit: Option<u32>,
    /// Rows to skip before the first returned row.
    pub skip: Option<u32>,
    /// Field inclusion/exclusion map.
    pub projection: Option<ProjectionSpec>,
}

/// Parse `sort: {field: 1|-1, ...}` from a JSON object.
pub fn parse_sort(value: &Value) -> Result<SortSpec, Vec<FilterError>> {
    let Some(map) = value.as_object() else {
        return Err(vec![FilterError::MalformedCondition {
            field: "sort".to_string(),
            reason: "must be an object mapping field names to 1 or -1".to_string(),
        }]);
    };

    let mut spec = SortSpec::new();
    let mut errors = Vec::new();
    for (field, direction) in map {
        let Some(n) = direction.as_i64() else {
            errors.push(FilterError::InvalidSortDirection {
                field: field.clone(),
                value: direction.clone(),
            });
            continue;
        };
        match SortOrder::from_wire(n) {
            Some(order) => {
                spec.insert(field.clone(), order);
            }
            None => errors.push(FilterError::InvalidSortDirection {
                field: field.clone(),
                value: direction.clone(),
            }),
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(spec)
}

/// Parse a non-negative integer option (`limit`/`skip`), whose name is
/// used in the error if the value isn't one.
pub fn parse_pagination_number(name: &'static str, value: &Value) -> Result<u32, FilterError> {
    value
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .ok_or(FilterError::InvalidPagination(name))
}

/// Parse `projection: {field: 1|0, ...}` from a JSON object. Unlike
/// `sort`, any truthy/falsy-looking value is accepted per the spec's
/// loose inclusion/exclusion convention; only the boolean-ish intent
/// matters, so both `1`/`0` and `true`/`false` are accepted.
pub fn parse_projection(value: &Value) -> Result<ProjectionSpec, Vec<FilterError>> {
    let Some(map) = value.as_object() else {
        return Err(vec![FilterError::MalformedCondition {
            field: "projection".to_string(),
            reason: "must be an object mapping field names to 1 or 0".to_string(),
        }]);
    };

    let mut spec = ProjectionSpec::new();
    for (field, included) in map {
        let include = truthy(included);
        spec.insert(field.clone(), include);
    }
    Ok(spec)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64().map(|n| n != 0).unwrap_or(true),
        _ => true,
    }
}

/// Extract the reserved option keys (`sort`, `limit`, `skip`,
/// `projection`) out of a request body map, leaving the remaining
/// entries as the filter map to parse separately.
pub fn split_reserved_options(
    mut body: Map<String, Value>,
) -> Result<(ReadOptions, Map<String, Value>), Vec<FilterError>> {
    let mut errors = Vec::new();
    let mut options = ReadOptions::default();

    if let Some(sort_value) = body.remove("sort") {
        match parse_sort(&sort_value) {
            Ok(spec) => options.sort = Some(spec),
            Err(mut errs) => errors.append(&mut errs),
        }
    }
    if let Some(limit_value) = body.remove("limit") {
        match parse_pagination_number("limit", &limit_value) {
            Ok(n) => options.limit = Some(n),
            Err(e) => errors.push(e),
        }
    }
    if let Some(skip_value) = body.remove("skip") {
        match parse_pagination_number("skip", &skip_value) {
            Ok(n) => options.skip = Some(n),
            Err(e) => errors.push(e),
        }
    }
    if let Some(projection_value) = body.remove("projection") {
        match parse_projection(&projection_value) {
            Ok(spec) => options.projection = Some(spec),
            Err(mut errs) => errors.append(&mut errs),
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }
    Ok((options, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sort_parses_one_and_negative_one() {
        let spec = parse_sort(&json!({"age": 1, "name": -1})).unwrap();
        assert_eq!(spec.get("age"), Some(&SortOrder::Asc));
        assert_eq!(spec.get("name"), Some(&SortOrder::Desc));
    }

    #[test]
    fn sort_rejects_any_other_direction() {
        let errors = parse_sort(&json!({"age": 2})).unwrap_err();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn pagination_number_rejects_negative_and_non_numeric() {
        assert!(parse_pagination_number("limit", &json!(-1)).is_err());
        assert!(parse_pagination_number("limit", &json!("5")).is_err());
        assert_eq!(parse_pagination_number("limit", &json!(5)).unwrap(), 5);
    }

    #[test]
    fn split_reserved_options_leaves_filter_fields_behind() {
        let body = json!({"status": "active", "limit": 10, "sort": {"age": 1}})
            .as_object()
            .unwrap()
            .clone();
        let (options, rest) = split_reserved_options(body).unwrap();
        assert_eq!(options.limit, Some(10));
        assert!(options.sort.is_some());
        assert_eq!(rest.len(), 1);
        assert!(rest.contains_key("status"));
    }
}
