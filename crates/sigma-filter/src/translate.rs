//! [`FilterTree`] → SQL translation (spec §4.5 "Translate").
//!
//! Produces a `WHERE`-clause fragment plus an ordered parameter list; the
//! caller (`sigma-repository`) owns binding those parameters into a
//! prepared statement and appending the fragment to a base query.

use sigma_dialect::{SqlDialect, SqlParam};
use sigma_types::{FilterTree, LogicalOp};

use crate::error::FilterError;
use crate::operators::OperatorRegistry;

/// A translated filter: a boolean SQL expression plus the parameters it
/// binds, in placeholder order.
#[derive(Debug, Clone)]
pub struct FilterResult {
    /// Boolean expression suitable for a `WHERE` clause. Never empty;
    /// an always-true filter renders as the literal `TRUE`.
    pub where_clause: String,
    /// Parameters bound by `where_clause`'s placeholders, in order.
    pub params: Vec<SqlParam>,
}

/// Translate `tree` into a [`FilterResult`] against `dialect`, starting
/// placeholder numbering at `starting_index` (1-based) so callers can
/// translate a filter after already binding other parameters (e.g. a
/// `table_name` equality the repository prepends).
pub fn translate(
    tree: &FilterTree,
    dialect: &dyn SqlDialect,
    registry: &OperatorRegistry,
    starting_index: usize,
) -> Result<FilterResult, FilterError> {
    let mut params = Vec::new();
    let mut next_index = starting_index;
    let mut bind = |param: SqlParam| -> String {
        params.push(param);
        let placeholder = dialect.bind_placeholder(next_index);
        next_index += 1;
        placeholder
    };

    let where_clause = render(tree, dialect, registry, &mut bind)?;
    Ok(FilterResult { where_clause, params })
}

fn render(
    tree: &FilterTree,
    dialect: &dyn SqlDialect,
    registry: &OperatorRegistry,
    bind: &mut dyn FnMut(SqlParam) -> String,
) -> Result<String, FilterError> {
    match tree {
        FilterTree::FieldCond { field, op, value } => {
            registry.get(*op).emit(dialect, field, value, bind)
        }
        FilterTree::Logical { op, children } => {
            if children.is_empty() {
                return Ok(match op {
                    // Empty `and` ⇒ vacuously true; empty `or`/`nor` would
                    // only arise from a hand-built tree, not the parser,
                    // but render sensibly regardless.
                    LogicalOp::And => "TRUE".to_string(),
                    LogicalOp::Or => "FALSE".to_string(),
                    LogicalOp::Nor => "TRUE".to_string(),
                });
            }
            let rendered: Result<Vec<String>, FilterError> = children
                .iter()
                .map(|child| render(child, dialect, registry, bind))
                .collect();
            let rendered = rendered?;
            let joiner = match op {
                LogicalOp::And => " AND ",
                LogicalOp::Or | LogicalOp::Nor => " OR ",
            };
            let joined = rendered
                .into_iter()
                .map(|clause| format!("({clause})"))
                .collect::<Vec<_>>()
                .join(joiner);
            Ok(match op {
                LogicalOp::Nor => format!("NOT ({joined})"),
                _ => joined,
            })
        }
        FilterTree::Not { child } => {
            let inner = render(child, dialect, registry, bind)?;
            Ok(format!("NOT ({inner})"))
        }
    }
}
