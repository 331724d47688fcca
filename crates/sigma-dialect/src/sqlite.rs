//! SQLite [`SqlDialect`](crate::SqlDialect) implementation.
//!
//! Stands in for the embeddable/dev-mode role `spec.md` assigns to H2
//! (see `/root/crate/DESIGN.md`, OQ-1): no native JSON or boolean type, no
//! `RETURNING ... id` recovery path that sqlx exposes uniformly, so this
//! dialect leans on SQLite's `json_extract`/`json_type` functions and the
//! `last_insert_rowid()` fallback.

use crate::{DialectKind, SqlDialect};

/// SQLite dialect: JSON1 extension functions, integer-encoded booleans,
/// `last_insert_rowid()` for id recovery.
#[derive(Debug, Default)]
pub struct SqliteDialect;

impl SqlDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn kind(&self) -> DialectKind {
        DialectKind::Sqlite
    }

    fn json_extract_text(&self, col: &str, path: &str) -> String {
        // SQLite's json_extract preserves the JSON scalar's native type
        // affinity (integer, real, text); cast explicitly so comparisons
        // against a bound TEXT parameter use consistent TEXT affinity
        // regardless of the stored value's JSON type.
        format!("CAST(json_extract({col}, '{}') AS TEXT)", sqlite_path(path))
    }

    fn json_extract(&self, col: &str, path: &str) -> String {
        format!("json_extract({col}, '{}')", sqlite_path(path))
    }

    fn json_exists(&self, col: &str, path: &str) -> String {
        format!("json_extract({col}, '{}') IS NOT NULL", sqlite_path(path))
    }

    fn json_type(&self, col: &str, path: &str) -> String {
        format!("json_type({col}, '{}')", sqlite_path(path))
    }

    fn cast_numeric(&self, expr: &str) -> String {
        format!("CAST({expr} AS REAL)")
    }

    fn pagination_clause(&self, limit: Option<u32>, offset: Option<u32>) -> String {
        match (limit, offset) {
            (Some(limit), Some(offset)) => format!("LIMIT {limit} OFFSET {offset}"),
            (Some(limit), None) => format!("LIMIT {limit}"),
            // SQLite requires a LIMIT before OFFSET; -1 means "no limit".
            (None, Some(offset)) => format!("LIMIT -1 OFFSET {offset}"),
            (None, None) => String::new(),
        }
    }

    fn limit_clause(&self, n: u32) -> String {
        format!("LIMIT {n}")
    }

    fn bool_literal(&self, value: bool) -> String {
        if value { "1".to_string() } else { "0".to_string() }
    }

    fn json_array_expand(&self, col: &str, path: &str, alias: &str) -> String {
        format!(
            "CROSS JOIN json_each({col}, '{}') AS {alias}",
            sqlite_path(path)
        )
    }

    fn insert_returning_id(&self) -> bool {
        false
    }

    fn last_insert_id_sql(&self) -> &'static str {
        "SELECT last_insert_rowid()"
    }

    fn ddl_for_documents_table(&self) -> Vec<String> {
        vec![
            r#"
            CREATE TABLE IF NOT EXISTS dynamic_documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                table_name TEXT NOT NULL,
                data TEXT NOT NULL,
                version INTEGER NOT NULL DEFAULT 0,
                is_deleted INTEGER NOT NULL DEFAULT 0,
                latest_request_id TEXT,
                created_by TEXT,
                last_modified_by TEXT,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                last_modified_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                sequence_number INTEGER NOT NULL DEFAULT 0
            )
            "#
            .trim()
            .to_string(),
            "CREATE INDEX IF NOT EXISTS idx_documents_table_deleted ON dynamic_documents (table_name, is_deleted)".to_string(),
            "CREATE INDEX IF NOT EXISTS idx_documents_table_sequence ON dynamic_documents (table_name, sequence_number)".to_string(),
            "CREATE INDEX IF NOT EXISTS idx_documents_table_modified ON dynamic_documents (table_name, last_modified_at)".to_string(),
            r#"
            CREATE TABLE IF NOT EXISTS sequence_checkpoints (
                collection TEXT PRIMARY KEY,
                sequence INTEGER NOT NULL,
                resume_token TEXT,
                last_updated TEXT NOT NULL
            )
            "#
            .trim()
            .to_string(),
            "CREATE TABLE IF NOT EXISTS dynamic_documents_sequence_counter (collection TEXT PRIMARY KEY, value INTEGER NOT NULL)".to_string(),
        ]
    }

    fn ddl_for_sequence_trigger(&self) -> Vec<String> {
        vec![
            r#"
            CREATE TRIGGER IF NOT EXISTS trg_dynamic_documents_sequence_insert
            AFTER INSERT ON dynamic_documents
            BEGIN
                INSERT INTO dynamic_documents_sequence_counter (collection, value)
                VALUES (NEW.table_name, 1)
                ON CONFLICT(collection) DO UPDATE SET value = value + 1;

                UPDATE dynamic_documents
                SET sequence_number = (SELECT value FROM dynamic_documents_sequence_counter WHERE collection = NEW.table_name)
                WHERE id = NEW.id;
            END
            "#
            .trim()
            .to_string(),
            r#"
            CREATE TRIGGER IF NOT EXISTS trg_dynamic_documents_sequence_update
            AFTER UPDATE ON dynamic_documents
            WHEN NEW.sequence_number = OLD.sequence_number
            BEGIN
                INSERT INTO dynamic_documents_sequence_counter (collection, value)
                VALUES (NEW.table_name, 1)
                ON CONFLICT(collection) DO UPDATE SET value = value + 1;

                UPDATE dynamic_documents
                SET sequence_number = (SELECT value FROM dynamic_documents_sequence_counter WHERE collection = NEW.table_name)
                WHERE id = NEW.id;
            END
            "#
            .trim()
            .to_string(),
        ]
    }

    fn bind_placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }
}

/// SQLite's JSON1 functions want a `$.a.b` path expression rather than the
/// bare dotted path this crate's callers pass around.
fn sqlite_path(path: &str) -> String {
    format!("$.{path}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_is_always_a_bare_question_mark() {
        let dialect = SqliteDialect::default();
        assert_eq!(dialect.bind_placeholder(1), "?");
        assert_eq!(dialect.bind_placeholder(7), "?");
    }

    #[test]
    fn pagination_with_only_offset_uses_negative_one_limit() {
        let dialect = SqliteDialect::default();
        assert_eq!(dialect.pagination_clause(None, Some(10)), "LIMIT -1 OFFSET 10");
    }

    #[test]
    fn json_extract_text_casts_to_text_and_uses_dollar_dot_notation() {
        let dialect = SqliteDialect::default();
        assert_eq!(
            dialect.json_extract_text("data", "address.city"),
            "CAST(json_extract(data, '$.address.city') AS TEXT)"
        );
    }

    #[test]
    fn json_extract_preserves_native_json_type() {
        let dialect = SqliteDialect::default();
        assert_eq!(
            dialect.json_extract("data", "address.city"),
            "json_extract(data, '$.address.city')"
        );
    }
}
