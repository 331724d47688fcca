#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **sigma-dialect** – DB-specific SQL emission for the Sigma data gateway.
//!
//! All dialect-specific text lives behind the [`SqlDialect`] trait. Adding a
//! dialect is one module plus a [`DialectKind`] variant and a factory entry
//! (spec §9 "Dialect as interface"). Everything above this crate — the
//! repository and the filter pipeline — talks to dialects only through the
//! trait, never by matching on a dialect tag itself.

use std::sync::Arc;

use serde_json::Value;

mod postgres;
mod sqlite;

pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

/// Errors raised selecting or probing a dialect.
#[derive(Debug, thiserror::Error)]
pub enum DialectError {
    /// The configured/inferred dialect has no implementation.
    #[error("unsupported database dialect: {0}")]
    Unsupported(String),
    /// The connection URL did not carry a recognizable scheme.
    #[error("cannot infer dialect from URL: {0}")]
    UnrecognizedUrl(String),
    /// A capability the startup probe requires is missing (spec §4.1
    /// "Failure policy" — unsupported features fail fast, not at query
    /// time).
    #[error("dialect {dialect} does not support required capability: {capability}")]
    MissingCapability {
        /// Offending dialect's display name.
        dialect: String,
        /// Capability name that failed the probe.
        capability: String,
    },
}

/// Tag identifying which [`SqlDialect`] implementation is active.
///
/// `spec.md` names Postgres/Oracle/H2; this port carries Postgres as the
/// production engine and Sqlite as the embeddable/dev-mode stand-in for
/// H2 (see `/root/crate/DESIGN.md`, OQ-1) — `sqlx` has no native Oracle or
/// H2 driver, so a third dialect would be a facade with nothing backing
/// it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialectKind {
    /// PostgreSQL.
    Postgres,
    /// SQLite.
    Sqlite,
}

impl DialectKind {
    /// Infer a dialect from a JDBC-style connection URL scheme, or accept
    /// an explicit config override (`"postgres"`/`"postgresql"` or
    /// `"sqlite"`, case-insensitive) ahead of inference (spec §4.1
    /// "Selection").
    pub fn resolve(explicit_override: Option<&str>, database_url: &str) -> Result<Self, DialectError> {
        if let Some(name) = explicit_override {
            return Self::from_name(name);
        }
        let scheme = database_url
            .split_once("://")
            .map(|(scheme, _)| scheme)
            .ok_or_else(|| DialectError::UnrecognizedUrl(database_url.to_string()))?;
        match scheme {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "sqlite" | "file" => Ok(Self::Sqlite),
            other => Err(DialectError::UnrecognizedUrl(other.to_string())),
        }
    }

    fn from_name(name: &str) -> Result<Self, DialectError> {
        match name.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "sqlite" | "h2" => Ok(Self::Sqlite),
            other => Err(DialectError::Unsupported(other.to_string())),
        }
    }

    /// Build the concrete [`SqlDialect`] for this tag.
    pub fn build(self) -> Arc<dyn SqlDialect> {
        let dialect: Arc<dyn SqlDialect> = match self {
            Self::Postgres => Arc::new(PostgresDialect::default()),
            Self::Sqlite => Arc::new(SqliteDialect::default()),
        };
        tracing::info!(dialect = dialect.name(), "selected SQL dialect");
        dialect
    }
}

/// A bound SQL parameter, dialect-agnostic at the call site.
///
/// The filter pipeline and repository build these from JSON values coming
/// off the wire; the dialect/driver layer binds them with the right
/// native type per backend.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    /// UTF-8 text.
    Text(String),
    /// 64-bit integer.
    Int(i64),
    /// Double-precision float.
    Float(f64),
    /// Boolean (encoded per-dialect at bind time where there is no native
    /// bool type).
    Bool(bool),
    /// SQL NULL.
    Null,
}

impl SqlParam {
    /// Best-effort conversion from a JSON scalar used as a filter operand.
    pub fn from_json_scalar(value: &Value) -> Self {
        match value {
            Value::String(s) => Self::Text(s.clone()),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else {
                    Self::Float(n.as_f64().unwrap_or_default())
                }
            }
            Value::Bool(b) => Self::Bool(*b),
            Value::Null => Self::Null,
            other => Self::Text(other.to_string()),
        }
    }
}

/// Capability surface every supported database must expose (spec §4.1).
///
/// Implementations are pure text-emitters: they never touch a connection.
/// `sigma-repository` owns binding parameters and executing the resulting
/// SQL.
pub trait SqlDialect: Send + Sync {
    /// Human-readable name, used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Which [`DialectKind`] this implementation answers for.
    fn kind(&self) -> DialectKind;

    /// Extract `path` out of JSON column `col` as text.
    fn json_extract_text(&self, col: &str, path: &str) -> String;

    /// Extract `path` out of JSON column `col`, preserving JSON typing.
    fn json_extract(&self, col: &str, path: &str) -> String;

    /// Predicate: does `path` exist within JSON column `col`?
    fn json_exists(&self, col: &str, path: &str) -> String;

    /// Expression yielding a type token (`"string"`, `"number"`,
    /// `"boolean"`, `"object"`, `"array"`, `"null"`) for `path` in `col`.
    fn json_type(&self, col: &str, path: &str) -> String;

    /// Cast a JSON-extracted text expression to a numeric type, for
    /// ordering comparisons (`gt`/`gte`/`lt`/`lte`) against fields whose
    /// JSON value is a number (spec §4.5 "Numeric comparisons cast the
    /// extracted text to a numeric type").
    fn cast_numeric(&self, expr: &str) -> String;

    /// `LIMIT n OFFSET m` (or dialect equivalent); either bound may be
    /// absent.
    fn pagination_clause(&self, limit: Option<u32>, offset: Option<u32>) -> String;

    /// Single-row limit clause, used for "fetch exactly one".
    fn limit_clause(&self, n: u32) -> String;

    /// Literal SQL spelling of a boolean, for engines without a native
    /// bool type.
    fn bool_literal(&self, value: bool) -> String;

    /// `column = <bool literal>` comparison, honoring the same encoding
    /// as [`SqlDialect::bool_literal`].
    fn bool_column_eq(&self, col: &str, value: bool) -> String {
        format!("{col} = {}", self.bool_literal(value))
    }

    /// `FROM`-clause fragment that unnests the JSON array at `path`
    /// within `col` into rows, aliased as `alias`.
    fn json_array_expand(&self, col: &str, path: &str, alias: &str) -> String;

    /// Whether `INSERT ... RETURNING id` is supported (else the last
    /// insert id must be recovered with [`SqlDialect::last_insert_id_sql`]).
    fn insert_returning_id(&self) -> bool;

    /// Statement to recover the last assigned row id when
    /// [`SqlDialect::insert_returning_id`] is `false`.
    fn last_insert_id_sql(&self) -> &'static str;

    /// `CREATE TABLE IF NOT EXISTS dynamic_documents (...)` plus the
    /// required indices (spec §4.1, §6 "Persistent state").
    fn ddl_for_documents_table(&self) -> Vec<String>;

    /// DDL installing per-row `sequence_number` auto-assignment.
    fn ddl_for_sequence_trigger(&self) -> Vec<String>;

    /// Render a positional bind placeholder for the `index`-th parameter
    /// (1-based), e.g. `$1` for Postgres or `?` for Sqlite.
    fn bind_placeholder(&self, index: usize) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_prefers_explicit_override_over_url() {
        let kind = DialectKind::resolve(Some("sqlite"), "postgres://x").unwrap();
        assert_eq!(kind, DialectKind::Sqlite);
    }

    #[test]
    fn resolve_infers_from_url_scheme() {
        assert_eq!(
            DialectKind::resolve(None, "postgres://user@host/db").unwrap(),
            DialectKind::Postgres
        );
        assert_eq!(
            DialectKind::resolve(None, "sqlite://data.db").unwrap(),
            DialectKind::Sqlite
        );
    }

    #[test]
    fn resolve_rejects_unrecognized_scheme() {
        assert!(DialectKind::resolve(None, "mysql://host/db").is_err());
    }

    #[test]
    fn sql_param_from_json_scalar_picks_the_narrowest_numeric_type() {
        assert_eq!(SqlParam::from_json_scalar(&Value::from(5)), SqlParam::Int(5));
        assert_eq!(
            SqlParam::from_json_scalar(&Value::from(5.5)),
            SqlParam::Float(5.5)
        );
        assert_eq!(
            SqlParam::from_json_scalar(&Value::from(true)),
            SqlParam::Bool(true)
        );
    }
}
