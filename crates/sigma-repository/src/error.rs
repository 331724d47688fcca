//! Errors raised by the document repository.

use sigma_filter::FilterError;

/// Failures surfaced by a [`crate::DocumentRepository`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// The driver returned an error executing or preparing a statement.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored `data` payload was not valid JSON, or a value read back
    /// from the database didn't decode into the expected shape.
    #[error("malformed document payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// `find_by_id`/`update_one` targeted a row that doesn't exist (or is
    /// already soft-deleted and the caller didn't ask to include those).
    #[error("document not found")]
    NotFound,

    /// An `If-Match` precondition didn't hold against the row's current
    /// `version` (spec §4.9 "Optimistic concurrency").
    #[error("version conflict: expected {expected}, found {actual}")]
    VersionConflict {
        /// Version the caller supplied.
        expected: i64,
        /// Version actually stored.
        actual: i64,
    },

    /// A filter failed parse/validate before it ever reached SQL
    /// translation.
    #[error("invalid filter: {0:?}")]
    Filter(Vec<FilterError>),

    /// A stored timestamp column wasn't valid RFC 3339 (SQLite stores
    /// timestamps as text; Postgres decodes natively and never hits
    /// this path).
    #[error("malformed timestamp: {0}")]
    Timestamp(String),
}
