//! Operator registry: one small strategy object per operator, selected by
//! token, with no central `match` over all operators (spec §9 "Operator
//! strategies"). Modeled on the handler-registry shape in the teacher
//! lineage's kernel opcode dispatch.

use std::collections::HashMap;

use serde_json::Value;
use sigma_dialect::{SqlDialect, SqlParam};
use sigma_types::Operator;

use crate::column;
use crate::error::FilterError;

/// Binds a value as the next positional parameter and returns its
/// placeholder text (`$3`, `?`, ...). Implemented by the translator so
/// every strategy shares one parameter list and one placeholder counter.
pub type Binder<'a> = dyn FnMut(SqlParam) -> String + 'a;

/// A single operator's parse-time-validated-already SQL emission.
pub trait OperatorStrategy: Send + Sync {
    /// Render `field <op> value` as a SQL boolean expression, binding any
    /// parameters it needs through `bind`.
    fn emit(
        &self,
        dialect: &dyn SqlDialect,
        field: &str,
        value: &Value,
        bind: &mut Binder<'_>,
    ) -> Result<String, FilterError>;
}

/// Registry of operator → strategy, built once and shared by the
/// translator.
pub struct OperatorRegistry {
    strategies: HashMap<Operator, Box<dyn OperatorStrategy>>,
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        let mut strategies: HashMap<Operator, Box<dyn OperatorStrategy>> = HashMap::new();
        strategies.insert(Operator::Eq, Box::new(EqStrategy { negate: false }));
        strategies.insert(Operator::Ne, Box::new(EqStrategy { negate: true }));
        strategies.insert(Operator::Gt, Box::new(OrderingStrategy { sql_op: ">" }));
        strategies.insert(Operator::Gte, Box::new(OrderingStrategy { sql_op: ">=" }));
        strategies.insert(Operator::Lt, Box::new(OrderingStrategy { sql_op: "<" }));
        strategies.insert(Operator::Lte, Box::new(OrderingStrategy { sql_op: "<=" }));
        strategies.insert(Operator::In, Box::new(MembershipStrategy { negate: false }));
        strategies.insert(Operator::Nin, Box::new(MembershipStrategy { negate: true }));
        strategies.insert(Operator::Regex, Box::new(RegexStrategy));
        strategies.insert(Operator::Exists, Box::new(ExistsStrategy));
        strategies.insert(Operator::Type, Box::new(TypeStrategy));
        Self { strategies }
    }
}

impl OperatorRegistry {
    /// Look up the strategy for `op`. Every [`Operator`] variant has an
    /// entry; a miss indicates the registry and the `Operator` enum have
    /// drifted apart.
    pub fn get(&self, op: Operator) -> &dyn OperatorStrategy {
        self.strategies
            .get(&op)
            .map(AsRef::as_ref)
            .unwrap_or_else(|| panic!("operator registry missing entry for {op:?}"))
    }
}

struct EqStrategy {
    negate: bool,
}

impl OperatorStrategy for EqStrategy {
    fn emit(
        &self,
        dialect: &dyn SqlDialect,
        field: &str,
        value: &Value,
        bind: &mut Binder<'_>,
    ) -> Result<String, FilterError> {
        let expr = column::text_expr(dialect, field);
        let param = if field == "_id" { id_param(value)? } else { text_param(value) };
        let placeholder = bind(param);
        let op = if self.negate { "<>" } else { "=" };
        Ok(format!("{expr} {op} {placeholder}"))
    }
}

struct OrderingStrategy {
    sql_op: &'static str,
}

impl OperatorStrategy for OrderingStrategy {
    fn emit(
        &self,
        dialect: &dyn SqlDialect,
        field: &str,
        value: &Value,
        bind: &mut Binder<'_>,
    ) -> Result<String, FilterError> {
        let expr = column::numeric_expr(dialect, field);
        let placeholder = bind(SqlParam::from_json_scalar(value));
        Ok(format!("{expr} {} {placeholder}", self.sql_op))
    }
}

struct MembershipStrategy {
    negate: bool,
}

impl OperatorStrategy for MembershipStrategy {
    fn emit(
        &self,
        dialect: &dyn SqlDialect,
        field: &str,
        value: &Value,
        bind: &mut Binder<'_>,
    ) -> Result<String, FilterError> {
        let items = value.as_array().expect("parser guarantees in/nin operands are arrays");
        let expr = column::text_expr(dialect, field);
        if items.is_empty() {
            // Empty `in` ⇒ FALSE, empty `nin` ⇒ TRUE (spec §8 boundary).
            return Ok(if self.negate { "TRUE".to_string() } else { "FALSE".to_string() });
        }
        let placeholders = items
            .iter()
            .map(|item| {
                let param = if field == "_id" { id_param(item)? } else { text_param(item) };
                Ok(bind(param))
            })
            .collect::<Result<Vec<String>, FilterError>>()?;
        let keyword = if self.negate { "NOT IN" } else { "IN" };
        Ok(format!("{expr} {keyword} ({})", placeholders.join(", ")))
    }
}

struct RegexStrategy;

impl OperatorStrategy for RegexStrategy {
    fn emit(
        &self,
        dialect: &dyn SqlDialect,
        field: &str,
        value: &Value,
        bind: &mut Binder<'_>,
    ) -> Result<String, FilterError> {
        let pattern = value.as_str().unwrap_or_default();
        let expr = column::text_expr(dialect, field);
        let placeholder = bind(SqlParam::Text(regex_to_like_pattern(pattern)));
        Ok(format!("{expr} LIKE {placeholder} ESCAPE '\\'"))
    }
}

struct ExistsStrategy;

impl OperatorStrategy for ExistsStrategy {
    fn emit(
        &self,
        dialect: &dyn SqlDialect,
        field: &str,
        value: &Value,
        _bind: &mut Binder<'_>,
    ) -> Result<String, FilterError> {
        let expect_present = value.as_bool().unwrap_or(true);
        let predicate = column::exists_expr(dialect, field);
        Ok(if expect_present { predicate } else { format!("NOT ({predicate})") })
    }
}

struct TypeStrategy;

impl OperatorStrategy for TypeStrategy {
    fn emit(
        &self,
        dialect: &dyn SqlDialect,
        field: &str,
        value: &Value,
        bind: &mut Binder<'_>,
    ) -> Result<String, FilterError> {
        let expr = column::type_expr(dialect, field);
        let placeholder = bind(SqlParam::Text(value.as_str().unwrap_or_default().to_string()));
        Ok(format!("{expr} = {placeholder}"))
    }
}

/// Render a JSON scalar as the text value `EqStrategy`/`MembershipStrategy`
/// bind, matching what `json_extract_text` yields for that scalar.
fn text_param(value: &Value) -> SqlParam {
    match value {
        Value::String(s) => SqlParam::Text(s.clone()),
        Value::Number(n) => SqlParam::Text(n.to_string()),
        Value::Bool(b) => SqlParam::Text(b.to_string()),
        Value::Null => SqlParam::Null,
        other => SqlParam::Text(other.to_string()),
    }
}

/// `_id` binds against the integer primary key column, never the `data`
/// JSON blob, so its parameter must be an actual integer rather than the
/// text `EqStrategy` otherwise binds (spec §3 "`_id` is implicitly
/// allowed with equality").
fn id_param(value: &Value) -> Result<SqlParam, FilterError> {
    let parsed = match value {
        Value::String(s) => s.parse::<i64>().ok(),
        Value::Number(n) => n.as_i64(),
        _ => None,
    };
    parsed.map(SqlParam::Int).ok_or_else(|| FilterError::MalformedCondition {
        field: "_id".to_string(),
        reason: "must be an integer document id".to_string(),
    })
}

/// Translate a Mongo-`$regex`-flavored pattern into a SQL `LIKE` pattern:
/// `.` → `_`, `.*` → `%`, and any literal `%`/`_`/`\` in the source is
/// escaped so it is matched literally rather than as a wildcard (spec
/// §4.5 "a literal-escaping pass avoids injection by wildcard
/// metacharacters").
fn regex_to_like_pattern(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '%' | '_' | '\\' => {
                out.push('\\');
                out.push(chars[i]);
            }
            '.' if chars.get(i + 1) == Some(&'*') => {
                out.push('%');
                i += 1;
            }
            '.' => out.push('_'),
            c => out.push(c),
        }
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regex_translation_maps_dot_star_and_escapes_literals() {
        assert_eq!(regex_to_like_pattern("abc.*"), "abc%");
        assert_eq!(regex_to_like_pattern("a.c"), "a_c");
        assert_eq!(regex_to_like_pattern("100%_off"), "100\\%\\_off");
    }

    #[test]
    fn id_equality_binds_an_integer_parameter_not_text() {
        use sigma_dialect::PostgresDialect;
        let dialect = PostgresDialect::default();
        let registry = OperatorRegistry::default();
        let mut params = Vec::new();
        let mut bind = |p: SqlParam| {
            params.push(p);
            "$1".to_string()
        };
        let sql = registry.get(Operator::Eq).emit(&dialect, "_id", &Value::String("7".to_string()), &mut bind).unwrap();
        assert_eq!(sql, "id = $1");
        assert_eq!(params, vec![SqlParam::Int(7)]);
    }

    #[test]
    fn registry_has_an_entry_for_every_operator() {
        let registry = OperatorRegistry::default();
        for op in [
            Operator::Eq, Operator::Ne, Operator::Gt, Operator::Gte, Operator::Lt, Operator::Lte,
            Operator::In, Operator::Nin, Operator::Regex, Operator::Exists, Operator::Type,
        ] {
            let _ = registry.get(op);
        }
    }
}
