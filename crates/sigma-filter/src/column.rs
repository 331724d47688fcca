//! Field → SQL column-expression mapping shared by the translator and the
//! operator registry.
//!
//! `_id` is the one field that is never a JSON path — it is the document's
//! primary key column, implicitly allowed with equality everywhere (spec
//! §3 invariant).

use sigma_dialect::SqlDialect;

const DATA_COLUMN: &str = "data";
const ID_COLUMN: &str = "id";

/// Text-typed expression for `field`, suitable for equality, membership,
/// and `LIKE` comparisons.
pub fn text_expr(dialect: &dyn SqlDialect, field: &str) -> String {
    if field == "_id" {
        ID_COLUMN.to_string()
    } else {
        dialect.json_extract_text(DATA_COLUMN, field)
    }
}

/// Numeric-cast expression for `field`, for ordering comparisons.
pub fn numeric_expr(dialect: &dyn SqlDialect, field: &str) -> String {
    if field == "_id" {
        ID_COLUMN.to_string()
    } else {
        dialect.cast_numeric(&dialect.json_extract_text(DATA_COLUMN, field))
    }
}

/// Existence predicate expression for `field`.
pub fn exists_expr(dialect: &dyn SqlDialect, field: &str) -> String {
    if field == "_id" {
        "TRUE".to_string()
    } else {
        dialect.json_exists(DATA_COLUMN, field)
    }
}

/// Type-token expression for `field`.
pub fn type_expr(dialect: &dyn SqlDialect, field: &str) -> String {
    if field == "_id" {
        "'number'".to_string()
    } else {
        dialect.json_type(DATA_COLUMN, field)
    }
}
