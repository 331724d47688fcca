//! PostgreSQL [`SqlDialect`](crate::SqlDialect) implementation.

use crate::{DialectKind, SqlDialect};

/// Render a dot-separated JSON path (`"address.city"`) as the
/// comma-separated brace array Postgres's `#>`/`#>>` operators expect
/// (`"{address,city}"`).
fn pg_path_array(path: &str) -> String {
    path.split('.').collect::<Vec<_>>().join(",")
}

/// The production dialect: native `jsonb`, native `boolean`, `RETURNING`,
/// `jsonb_array_elements`, and a `GIN` index on `data`.
#[derive(Debug, Default)]
pub struct PostgresDialect;

impl SqlDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn kind(&self) -> DialectKind {
        DialectKind::Postgres
    }

    fn json_extract_text(&self, col: &str, path: &str) -> String {
        format!("{col} #>> '{{{}}}'", pg_path_array(path))
    }

    fn json_extract(&self, col: &str, path: &str) -> String {
        format!("{col} #> '{{{}}}'", pg_path_array(path))
    }

    fn json_exists(&self, col: &str, path: &str) -> String {
        format!("jsonb_path_exists({col}, '$.{path}')")
    }

    fn json_type(&self, col: &str, path: &str) -> String {
        format!("jsonb_typeof({col} #> '{{{path}}}')")
    }

    fn cast_numeric(&self, expr: &str) -> String {
        format!("({expr})::numeric")
    }

    fn pagination_clause(&self, limit: Option<u32>, offset: Option<u32>) -> String {
        let mut clause = String::new();
        if let Some(limit) = limit {
            clause.push_str(&format!("LIMIT {limit}"));
        }
        if let Some(offset) = offset {
            if !clause.is_empty() {
                clause.push(' ');
            }
            clause.push_str(&format!("OFFSET {offset}"));
        }
        clause
    }

    fn limit_clause(&self, n: u32) -> String {
        format!("LIMIT {n}")
    }

    fn bool_literal(&self, value: bool) -> String {
        if value { "TRUE".to_string() } else { "FALSE".to_string() }
    }

    fn json_array_expand(&self, col: &str, path: &str, alias: &str) -> String {
        format!(
            "CROSS JOIN LATERAL jsonb_array_elements({col} #> '{{{}}}') AS {alias}(value)",
            pg_path_array(path)
        )
    }

    fn insert_returning_id(&self) -> bool {
        true
    }

    fn last_insert_id_sql(&self) -> &'static str {
        ""
    }

    fn ddl_for_documents_table(&self) -> Vec<String> {
        vec![
            r#"
            CREATE TABLE IF NOT EXISTS dynamic_documents (
                id BIGSERIAL PRIMARY KEY,
                table_name TEXT NOT NULL,
                data JSONB NOT NULL,
                version BIGINT NOT NULL DEFAULT 0,
                is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
                latest_request_id TEXT,
                created_by TEXT,
                last_modified_by TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                last_modified_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                sequence_number BIGINT NOT NULL DEFAULT 0
            )
            "#
            .trim()
            .to_string(),
            "CREATE INDEX IF NOT EXISTS idx_documents_table_deleted ON dynamic_documents (table_name, is_deleted)".to_string(),
            "CREATE INDEX IF NOT EXISTS idx_documents_table_sequence ON dynamic_documents (table_name, sequence_number)".to_string(),
            "CREATE INDEX IF NOT EXISTS idx_documents_table_modified ON dynamic_documents (table_name, last_modified_at)".to_string(),
            "CREATE INDEX IF NOT EXISTS idx_documents_data_gin ON dynamic_documents USING GIN (data)".to_string(),
            r#"
            CREATE TABLE IF NOT EXISTS sequence_checkpoints (
                collection TEXT PRIMARY KEY,
                sequence BIGINT NOT NULL,
                resume_token TEXT,
                last_updated TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#
            .trim()
            .to_string(),
        ]
    }

    fn ddl_for_sequence_trigger(&self) -> Vec<String> {
        vec![
            "CREATE SEQUENCE IF NOT EXISTS dynamic_documents_sequence_number_seq".to_string(),
            r#"
            CREATE OR REPLACE FUNCTION dynamic_documents_assign_sequence()
            RETURNS TRIGGER AS $$
            BEGIN
                NEW.sequence_number := nextval('dynamic_documents_sequence_number_seq');
                RETURN NEW;
            END;
            $$ LANGUAGE plpgsql
            "#
            .trim()
            .to_string(),
            "DROP TRIGGER IF EXISTS trg_dynamic_documents_sequence ON dynamic_documents".to_string(),
            r#"
            CREATE TRIGGER trg_dynamic_documents_sequence
            BEFORE INSERT OR UPDATE ON dynamic_documents
            FOR EACH ROW EXECUTE FUNCTION dynamic_documents_assign_sequence()
            "#
            .trim()
            .to_string(),
        ]
    }

    fn bind_placeholder(&self, index: usize) -> String {
        format!("${index}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_one_based_dollar_numbers() {
        let dialect = PostgresDialect::default();
        assert_eq!(dialect.bind_placeholder(1), "$1");
        assert_eq!(dialect.bind_placeholder(2), "$2");
    }

    #[test]
    fn json_extract_text_renders_dotted_path_as_brace_array() {
        let dialect = PostgresDialect::default();
        assert_eq!(
            dialect.json_extract_text("data", "address.city"),
            "data #>> '{address,city}'"
        );
    }

    #[test]
    fn pagination_clause_combines_limit_and_offset() {
        let dialect = PostgresDialect::default();
        assert_eq!(dialect.pagination_clause(Some(10), Some(20)), "LIMIT 10 OFFSET 20");
        assert_eq!(dialect.pagination_clause(None, Some(5)), "OFFSET 5");
        assert_eq!(dialect.pagination_clause(Some(5), None), "LIMIT 5");
    }
}
