//! Filter map → [`FilterTree`] parsing (spec §4.5 "Parse").
//!
//! The external JSON is a map whose keys are either field names or the
//! reserved logical operators `and|or|nor|not`. Parsing never
//! short-circuits on the first bad key: every malformed entry is
//! collected so the caller can report all of them at once.

use serde_json::{Map, Value};
use sigma_types::{FilterTree, LogicalOp, Operator};

use crate::error::FilterError;

const RESERVED_KEYS: [&str; 4] = ["and", "or", "nor", "not"];

/// Parse a filter map into a [`FilterTree`].
///
/// An empty map parses to an always-true tree (`Logical{And, []}`),
/// matching the "empty filter ⇒ full collection" boundary (spec §8).
pub fn parse_filter_map(map: &Map<String, Value>) -> Result<FilterTree, Vec<FilterError>> {
    let mut errors = Vec::new();
    let mut children = Vec::new();

    for (key, value) in map {
        let bare_key = key.strip_prefix('$').unwrap_or(key);
        if RESERVED_KEYS.contains(&bare_key) {
            match parse_logical_entry(bare_key, value) {
                Ok(node) => children.push(node),
                Err(mut errs) => errors.append(&mut errs),
            }
        } else {
            match parse_field_entry(key, value) {
                Ok(mut nodes) => children.append(&mut nodes),
                Err(mut errs) => errors.append(&mut errs),
            }
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(match children.len() {
        0 => FilterTree::Logical { op: LogicalOp::And, children: vec![] },
        1 => children.into_iter().next().unwrap(),
        _ => FilterTree::Logical { op: LogicalOp::And, children },
    })
}

fn parse_logical_entry(op_name: &str, value: &Value) -> Result<FilterTree, Vec<FilterError>> {
    if op_name == "not" {
        let Some(obj) = value.as_object() else {
            return Err(vec![FilterError::NotRequiresSingleCondition]);
        };
        let child = parse_filter_map(obj)?;
        return Ok(FilterTree::Not { child: Box::new(child) });
    }

    let Some(logical_op) = LogicalOp::parse(op_name) else {
        return Err(vec![FilterError::UnknownOperator(op_name.to_string())]);
    };

    let Some(array) = value.as_array() else {
        return Err(vec![FilterError::ExpectedArrayForLogical(op_name.to_string())]);
    };

    let mut children = Vec::new();
    let mut errors = Vec::new();
    for entry in array {
        let Some(obj) = entry.as_object() else {
            errors.push(FilterError::MalformedCondition {
                field: op_name.to_string(),
                reason: "logical operator children must be filter objects".to_string(),
            });
            continue;
        };
        match parse_filter_map(obj) {
            Ok(node) => children.push(node),
            Err(mut errs) => errors.append(&mut errs),
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(FilterTree::Logical { op: logical_op, children })
}

fn parse_field_entry(field: &str, value: &Value) -> Result<Vec<FilterTree>, Vec<FilterError>> {
    match value {
        // Implicit equality: {field: scalar}
        Value::String(_) | Value::Number(_) | Value::Bool(_) | Value::Null => {
            Ok(vec![FilterTree::FieldCond {
                field: field.to_string(),
                op: Operator::Eq,
                value: value.clone(),
            }])
        }
        Value::Array(_) => Err(vec![FilterError::MalformedCondition {
            field: field.to_string(),
            reason: "a bare array is not a valid condition; wrap operators in an object".to_string(),
        }]),
        Value::Object(operator_map) => {
            if operator_map.is_empty() {
                return Err(vec![FilterError::MalformedCondition {
                    field: field.to_string(),
                    reason: "empty operator object".to_string(),
                }]);
            }
            let mut nodes = Vec::new();
            let mut errors = Vec::new();
            for (op_token, operand) in operator_map {
                match parse_operator_entry(field, op_token, operand) {
                    Ok(node) => nodes.push(node),
                    Err(e) => errors.push(e),
                }
            }
            if !errors.is_empty() {
                return Err(errors);
            }
            Ok(nodes)
        }
    }
}

fn parse_operator_entry(field: &str, op_token: &str, operand: &Value) -> Result<FilterTree, FilterError> {
    let Some(op) = Operator::parse(op_token) else {
        return Err(FilterError::UnknownOperator(op_token.to_string()));
    };

    match op {
        Operator::In | Operator::Nin => {
            if !operand.is_array() {
                return Err(FilterError::ExpectedList {
                    field: field.to_string(),
                    operator: op.wire_token().to_string(),
                });
            }
        }
        Operator::Exists => {
            if !operand.is_boolean() {
                return Err(FilterError::ExistsRequiresBoolean(field.to_string()));
            }
        }
        _ => {}
    }

    Ok(FilterTree::FieldCond {
        field: field.to_string(),
        op,
        value: operand.clone(),
    })
}
