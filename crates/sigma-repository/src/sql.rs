//! Dialect-agnostic statement text assembly.
//!
//! Every function here returns a `String` built purely from `&dyn
//! SqlDialect` calls and plain formatting — no sqlx types appear. The
//! backend modules own turning this text plus a parameter list into an
//! executed query.

use sigma_dialect::SqlDialect;
use sigma_types::SortSpec;

/// Column list shared by every `SELECT` against `dynamic_documents`.
pub const DOCUMENT_COLUMNS: &str = "id, table_name, data, version, is_deleted, latest_request_id, \
     created_by, last_modified_by, created_at, last_modified_at, sequence_number";

/// `SELECT ... FROM dynamic_documents WHERE table_name = <placeholder for collection>
/// AND (<user filter>) [AND is_deleted = FALSE] [ORDER BY ...] [pagination]`.
///
/// `collection_placeholder` and `where_clause` are expected to already
/// carry correctly numbered placeholders (the caller translates the
/// filter starting at index 2, since `table_name` always binds as `$1`
/// / the first `?`).
pub fn select_documents(
    dialect: &dyn SqlDialect,
    collection_placeholder: &str,
    where_clause: &str,
    include_deleted: bool,
    sort: Option<&SortSpec>,
    limit: Option<u32>,
    offset: Option<u32>,
) -> String {
    let mut sql = format!(
        "SELECT {DOCUMENT_COLUMNS} FROM dynamic_documents WHERE table_name = {collection_placeholder} AND ({where_clause})"
    );
    if !include_deleted {
        sql.push_str(&format!(" AND {}", dialect.bool_column_eq("is_deleted", false)));
    }
    if let Some(sort) = sort {
        if !sort.is_empty() {
            let order_by = sort
                .iter()
                .map(|(field, order)| {
                    let expr = crate::column_for_sort(dialect, field);
                    let dir = match order {
                        sigma_types::SortOrder::Asc => "ASC",
                        sigma_types::SortOrder::Desc => "DESC",
                    };
                    format!("{expr} {dir}")
                })
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&format!(" ORDER BY {order_by}"));
        }
    }
    let pagination = dialect.pagination_clause(limit, offset);
    if !pagination.is_empty() {
        sql.push(' ');
        sql.push_str(&pagination);
    }
    sql
}

/// `SELECT COUNT(*) FROM dynamic_documents WHERE table_name = <ph> AND (<filter>) [AND NOT deleted]`.
pub fn count_documents(
    dialect: &dyn SqlDialect,
    collection_placeholder: &str,
    where_clause: &str,
    include_deleted: bool,
) -> String {
    let mut sql = format!(
        "SELECT COUNT(*) AS total FROM dynamic_documents WHERE table_name = {collection_placeholder} AND ({where_clause})"
    );
    if !include_deleted {
        sql.push_str(&format!(" AND {}", dialect.bool_column_eq("is_deleted", false)));
    }
    sql
}

/// Insert one row, binding `table_name`, `data`, `created_by`,
/// `last_modified_by`, `latest_request_id` as `$1..$5` (or `?`
/// equivalents); timestamps default at the database.
pub fn insert_document(dialect: &dyn SqlDialect) -> String {
    let p1 = dialect.bind_placeholder(1);
    let p2 = dialect.bind_placeholder(2);
    let p3 = dialect.bind_placeholder(3);
    let p4 = dialect.bind_placeholder(4);
    let p5 = dialect.bind_placeholder(5);
    let now_postgres_default = ""; // created_at/last_modified_at use column defaults
    let _ = now_postgres_default;
    let returning = if dialect.insert_returning_id() { " RETURNING id" } else { "" };
    format!(
        "INSERT INTO dynamic_documents (table_name, data, created_by, last_modified_by, latest_request_id) \
         VALUES ({p1}, {p2}, {p3}, {p4}, {p5}){returning}"
    )
}

/// `UPDATE dynamic_documents SET data = <ph>, version = version + 1, last_modified_by = <ph>,
/// latest_request_id = <ph>, last_modified_at = <now> WHERE table_name = <ph> AND (<filter>)
/// AND is_deleted = FALSE`.
///
/// The merged `data` value is computed by the caller (the write
/// orchestrator owns merge semantics); this just binds the final JSON.
///
/// Placeholder order matches `select_documents`/`count_documents`:
/// `table_name` is always `$1` and the filter occupies the placeholders
/// the caller translated it at (starting from `$2`), so the same
/// [`sigma_filter::FilterResult`] can be reused across a read and a
/// write against the same rows. `tail_start` is the first placeholder
/// after the filter's own (`2 + filter.params.len()`), where `data`,
/// `last_modified_by`, and `latest_request_id` bind.
pub fn update_documents(
    dialect: &dyn SqlDialect,
    collection_placeholder: &str,
    where_clause: &str,
    tail_start: usize,
) -> String {
    let p_data = dialect.bind_placeholder(tail_start);
    let p_modifier = dialect.bind_placeholder(tail_start + 1);
    let p_request_id = dialect.bind_placeholder(tail_start + 2);
    let now_expr = current_timestamp_expr(dialect);
    format!(
        "UPDATE dynamic_documents SET data = {p_data}, version = version + 1, \
         last_modified_by = {p_modifier}, latest_request_id = {p_request_id}, last_modified_at = {now_expr} \
         WHERE table_name = {collection_placeholder} AND ({where_clause}) AND {}",
        dialect.bool_column_eq("is_deleted", false)
    )
}

/// `UPDATE ... SET is_deleted = TRUE, ... WHERE table_name = <ph> AND (<filter>) AND is_deleted = FALSE`.
///
/// Same placeholder convention as [`update_documents`]: `table_name` is
/// `$1`, the filter follows at `$2..`, and `tail_start` is where
/// `last_modified_by`/`latest_request_id` bind.
pub fn soft_delete_documents(
    dialect: &dyn SqlDialect,
    collection_placeholder: &str,
    where_clause: &str,
    tail_start: usize,
) -> String {
    let p_modifier = dialect.bind_placeholder(tail_start);
    let p_request_id = dialect.bind_placeholder(tail_start + 1);
    let now_expr = current_timestamp_expr(dialect);
    format!(
        "UPDATE dynamic_documents SET {}, version = version + 1, last_modified_by = {p_modifier}, \
         latest_request_id = {p_request_id}, last_modified_at = {now_expr} \
         WHERE table_name = {collection_placeholder} AND ({where_clause}) AND {}",
        dialect.bool_column_eq("is_deleted", true),
        dialect.bool_column_eq("is_deleted", false),
    )
}

/// `SELECT ... WHERE table_name = <ph> AND sequence_number > <ph> AND is_deleted = FALSE
/// ORDER BY sequence_number ASC <limit>` — the change-feed page query
/// (spec §4.8 "Sequence-based change feed"). Soft-deleted rows are
/// included: a delete is itself a change-feed event.
pub fn sequence_page(dialect: &dyn SqlDialect, limit: u32) -> String {
    let p_collection = dialect.bind_placeholder(1);
    let p_after = dialect.bind_placeholder(2);
    format!(
        "SELECT {DOCUMENT_COLUMNS} FROM dynamic_documents \
         WHERE table_name = {p_collection} AND sequence_number > {p_after} \
         ORDER BY sequence_number ASC {}",
        dialect.limit_clause(limit)
    )
}

/// `SELECT <document columns>, item.value AS item_value FROM (<parent
/// scoping query>) AS d <json_array_expand over d.data>` — the
/// nested-endpoint unnest query (spec §4.2 "find_nested", §4.8 "uses
/// find_nested"). The parent-scoping filter runs inside the subquery
/// (reusing [`select_documents`] verbatim) so its column references
/// (plain `id`/`data`, per `sigma-filter`'s column mapping) never
/// collide with the expansion's own columns — SQLite's `json_each`
/// exposes a column literally named `id`, which would otherwise make an
/// unqualified `id` in a `_id` filter ambiguous once the join is in
/// scope.
pub fn select_nested_items(
    dialect: &dyn SqlDialect,
    collection_placeholder: &str,
    where_clause: &str,
    father_path: &str,
    sort: Option<&SortSpec>,
    limit: Option<u32>,
    offset: Option<u32>,
) -> String {
    let parent_query = select_documents(dialect, collection_placeholder, where_clause, false, sort, limit, offset);
    let expand = dialect.json_array_expand("d.data", father_path, "item");
    format!(
        "SELECT d.id, d.table_name, d.data, d.version, d.is_deleted, d.latest_request_id, \
         d.created_by, d.last_modified_by, d.created_at, d.last_modified_at, d.sequence_number, \
         item.value AS item_value FROM ({parent_query}) AS d {expand}"
    )
}

fn current_timestamp_expr(dialect: &dyn SqlDialect) -> &'static str {
    match dialect.kind() {
        sigma_dialect::DialectKind::Postgres => "now()",
        // SQLite's bare CURRENT_TIMESTAMP omits the 'T'/'Z' RFC 3339
        // separators the repository's decode path expects; strftime with
        // an explicit format keeps every timestamp column parseable the
        // same way regardless of dialect.
        sigma_dialect::DialectKind::Sqlite => "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigma_dialect::PostgresDialect;

    #[test]
    fn select_documents_omits_soft_deleted_rows_by_default() {
        let dialect = PostgresDialect::default();
        let sql = select_documents(&dialect, "$1", "TRUE", false, None, None, None);
        assert!(sql.contains("is_deleted = FALSE"));
    }

    #[test]
    fn select_documents_includes_soft_deleted_when_asked() {
        let dialect = PostgresDialect::default();
        let sql = select_documents(&dialect, "$1", "TRUE", true, None, None, None);
        assert!(!sql.contains("is_deleted"));
    }

    #[test]
    fn insert_document_adds_returning_on_postgres() {
        let dialect = PostgresDialect::default();
        assert!(insert_document(&dialect).ends_with("RETURNING id"));
    }

    #[test]
    fn select_nested_items_scopes_the_filter_inside_the_parent_subquery() {
        let dialect = PostgresDialect::default();
        let sql = select_nested_items(&dialect, "$1", "data #>> '{status}' = $2", "items", None, None, None);
        assert!(sql.starts_with("SELECT d.id"));
        assert!(sql.contains("FROM (SELECT"));
        assert!(sql.contains("data #>> '{status}' = $2"));
        assert!(sql.contains("CROSS JOIN LATERAL jsonb_array_elements(d.data"));
        assert!(sql.contains("item.value AS item_value"));
    }
}
