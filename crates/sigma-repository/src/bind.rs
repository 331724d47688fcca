//! Generic parameter binding shared by both backends.
//!
//! `SqlParam` is dialect-agnostic; the four scalar Rust types it wraps
//! (`String`, `i64`, `f64`, `bool`) implement `sqlx::Encode`/`sqlx::Type`
//! for every backend sqlx supports, so one generic function binds a
//! parameter list regardless of which `Database` is in play.

use sigma_dialect::SqlParam;
use sqlx::database::HasArguments;
use sqlx::query::Query;
use sqlx::{Database, Encode, Type};

/// Bind a single [`SqlParam`] onto `query`, picking the matching native
/// type per variant.
pub fn bind_one<'q, DB>(
    query: Query<'q, DB, <DB as HasArguments<'q>>::Arguments>,
    param: &'q SqlParam,
) -> Query<'q, DB, <DB as HasArguments<'q>>::Arguments>
where
    DB: Database,
    String: Type<DB> + for<'r> Encode<'r, DB>,
    i64: Type<DB> + for<'r> Encode<'r, DB>,
    f64: Type<DB> + for<'r> Encode<'r, DB>,
    bool: Type<DB> + for<'r> Encode<'r, DB>,
{
    match param {
        SqlParam::Text(s) => query.bind(s),
        SqlParam::Int(i) => query.bind(i),
        SqlParam::Float(f) => query.bind(f),
        SqlParam::Bool(b) => query.bind(b),
        SqlParam::Null => query.bind(Option::<String>::None),
    }
}

/// Fold [`bind_one`] over an ordered parameter list.
pub fn bind_all<'q, DB>(
    mut query: Query<'q, DB, <DB as HasArguments<'q>>::Arguments>,
    params: &'q [SqlParam],
) -> Query<'q, DB, <DB as HasArguments<'q>>::Arguments>
where
    DB: Database,
    String: Type<DB> + for<'r> Encode<'r, DB>,
    i64: Type<DB> + for<'r> Encode<'r, DB>,
    f64: Type<DB> + for<'r> Encode<'r, DB>,
    bool: Type<DB> + for<'r> Encode<'r, DB>,
{
    for param in params {
        query = bind_one(query, param);
    }
    query
}
