//! The in-memory filter tree (spec §3 "Filter tree", §4.5).
//!
//! The external JSON shape is a map; this module defines the typed,
//! recursive-descent-friendly tree it parses into. Parsing, validation,
//! and SQL translation all live in `sigma-filter` — this crate only owns
//! the shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single comparison/membership/existence/type operator.
///
/// `$`-prefixed tokens on the wire (`$eq`, `$in`, ...) normalize to these
/// variants; see `sigma-filter::parse` for the normalization pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    /// Equality.
    Eq,
    /// Inequality.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
    /// Membership in a list.
    In,
    /// Non-membership in a list.
    Nin,
    /// SQL `LIKE`-style pattern match.
    Regex,
    /// Field presence/absence.
    Exists,
    /// JSON type-token match.
    Type,
}

impl Operator {
    /// Parse a wire token, accepting both `eq` and `$eq` spellings.
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.strip_prefix('$').unwrap_or(token);
        match token {
            "eq" => Some(Self::Eq),
            "ne" => Some(Self::Ne),
            "gt" => Some(Self::Gt),
            "gte" => Some(Self::Gte),
            "lt" => Some(Self::Lt),
            "lte" => Some(Self::Lte),
            "in" => Some(Self::In),
            "nin" => Some(Self::Nin),
            "regex" => Some(Self::Regex),
            "exists" => Some(Self::Exists),
            "type" => Some(Self::Type),
            _ => None,
        }
    }

    /// The canonical `$`-prefixed wire spelling, used in error messages.
    pub fn wire_token(self) -> &'static str {
        match self {
            Self::Eq => "$eq",
            Self::Ne => "$ne",
            Self::Gt => "$gt",
            Self::Gte => "$gte",
            Self::Lt => "$lt",
            Self::Lte => "$lte",
            Self::In => "$in",
            Self::Nin => "$nin",
            Self::Regex => "$regex",
            Self::Exists => "$exists",
            Self::Type => "$type",
        }
    }
}

/// Logical combinators over a list of child trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalOp {
    /// All children must match.
    And,
    /// At least one child must match.
    Or,
    /// None of the children may match.
    Nor,
}

impl LogicalOp {
    /// Parse a wire token, accepting both `and` and `$and` spellings.
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.strip_prefix('$').unwrap_or(token);
        match token {
            "and" => Some(Self::And),
            "or" => Some(Self::Or),
            "nor" => Some(Self::Nor),
            _ => None,
        }
    }
}

/// `sort: {field: ±1}` direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    /// Ascending (`1`).
    Asc,
    /// Descending (`-1`).
    Desc,
}

impl SortOrder {
    /// Parse the `1`/`-1` wire encoding.
    pub fn from_wire(n: i64) -> Option<Self> {
        match n {
            1 => Some(Self::Asc),
            -1 => Some(Self::Desc),
            _ => None,
        }
    }
}

/// The in-memory filter tree. Finite, acyclic, immutable after parse
/// (spec §3 invariant).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterTree {
    /// A single field condition.
    FieldCond {
        /// Field the condition applies to.
        field: String,
        /// The operator.
        op: Operator,
        /// The operator's operand, as raw JSON (interpretation is
        /// operator-specific: scalar, array, or boolean).
        value: Value,
    },
    /// `and`/`or`/`nor` over children.
    Logical {
        /// Which combinator.
        op: LogicalOp,
        /// Child trees; non-empty by construction (the parser rejects a
        /// logical operator with non-array or empty children).
        children: Vec<FilterTree>,
    },
    /// Negation of a single child.
    Not {
        /// The negated subtree.
        child: Box<FilterTree>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_parse_accepts_dollar_and_bare_spellings() {
        assert_eq!(Operator::parse("$eq"), Some(Operator::Eq));
        assert_eq!(Operator::parse("eq"), Some(Operator::Eq));
        assert_eq!(Operator::parse("$bogus"), None);
    }

    #[test]
    fn logical_op_parse_accepts_dollar_and_bare_spellings() {
        assert_eq!(LogicalOp::parse("$nor"), Some(LogicalOp::Nor));
        assert_eq!(LogicalOp::parse("nor"), Some(LogicalOp::Nor));
    }

    #[test]
    fn sort_order_rejects_values_other_than_plus_minus_one() {
        assert_eq!(SortOrder::from_wire(1), Some(SortOrder::Asc));
        assert_eq!(SortOrder::from_wire(-1), Some(SortOrder::Desc));
        assert_eq!(SortOrder::from_wire(2), None);
    }
}
