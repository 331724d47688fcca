//! Errors raised while parsing, validating, and translating filters.

use serde_json::Value;

/// A single filter failure. Validation never short-circuits: every leaf
/// and logical node that fails is reported (spec §4.5 "Validate",
/// property 6 in §8).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FilterError {
    /// An operator token wasn't recognized, or a logical operator token
    /// wasn't one of `and`/`or`/`nor`/`not`.
    #[error("unknown operator '{0}'")]
    UnknownOperator(String),

    /// `in`/`nin` was given something other than a JSON array.
    #[error("operator '{operator}' on field '{field}' requires a list value")]
    ExpectedList {
        /// Offending field.
        field: String,
        /// Offending operator token.
        operator: String,
    },

    /// `and`/`or`/`nor` was given something other than a JSON array of
    /// sub-filters.
    #[error("logical operator '{0}' requires an array of conditions")]
    ExpectedArrayForLogical(String),

    /// `not` was given an array instead of a single sub-filter.
    #[error("operator 'not' requires a single condition, not a list")]
    NotRequiresSingleCondition,

    /// A field's value was neither a scalar (implicit equality) nor an
    /// operator map.
    #[error("field '{field}' has a malformed condition: {reason}")]
    MalformedCondition {
        /// Offending field.
        field: String,
        /// Human-readable reason.
        reason: String,
    },

    /// `exists` was given something other than a JSON boolean.
    #[error("operator '$exists' on field '{0}' requires a boolean value")]
    ExistsRequiresBoolean(String),

    /// No `FilterConfig` entries at all for this direction.
    #[error("Filtering is not enabled for this endpoint")]
    FilteringNotEnabled,

    /// Referenced a field outside the endpoint's allowlist.
    #[error("Field '{0}' is not allowed for filtering")]
    FieldNotAllowed(String),

    /// Referenced an operator not in the field's allowed set.
    #[error("Operator {operator} is not allowed for field '{field}'")]
    OperatorNotAllowed {
        /// Offending field.
        field: String,
        /// Offending operator, rendered with its `$` prefix.
        operator: String,
    },

    /// A `sort` value wasn't `1` or `-1`.
    #[error("sort direction for field '{field}' must be 1 or -1, got {value}")]
    InvalidSortDirection {
        /// Offending field.
        field: String,
        /// Offending raw JSON value.
        value: Value,
    },

    /// `limit`/`skip` wasn't a non-negative integer.
    #[error("'{0}' must be a non-negative integer")]
    InvalidPagination(&'static str),
}
