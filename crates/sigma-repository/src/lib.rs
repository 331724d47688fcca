#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **sigma-repository** – The dialect-agnostic document repository for
//! the Sigma data gateway (spec §4.2 "Repository").
//!
//! The repository is the only crate that touches a connection pool.
//! Everything it emits as SQL text comes from a [`sigma_dialect::SqlDialect`]
//! and a pre-translated [`sigma_filter::FilterResult`]; the repository
//! itself never builds a `WHERE` clause by hand.

mod bind;
mod error;
mod postgres;
mod sql;
mod sqlite;

pub use error::RepositoryError;
pub use postgres::PostgresRepository;
pub use sqlite::SqliteRepository;

use async_trait::async_trait;
use serde_json::Value;
use sigma_dialect::SqlDialect;
use sigma_filter::{FilterResult, ReadOptions};
use sigma_types::{AuditContext, Document, DocumentId, SequenceCheckpoint};

/// Outcome of a bulk update/upsert/delete, independent of the HTTP
/// envelope `sigma-gateway` wraps it in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationCount {
    /// Rows the filter matched.
    pub matched: u64,
    /// Rows whose stored `data` actually changed (spec §4.9 "no-op
    /// detection" — a matched-but-unchanged row does not bump `version`
    /// or `sequence_number`).
    pub modified: u64,
}

/// The document repository's full surface (spec §4.2). One
/// implementation per [`sigma_dialect::DialectKind`].
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// The dialect this repository emits SQL for.
    fn dialect(&self) -> &dyn SqlDialect;

    /// Run the dialect's DDL to create `dynamic_documents`,
    /// `sequence_checkpoints`, and the sequence-assignment trigger, all
    /// idempotently (spec §6 "Persistent state").
    async fn ensure_schema(&self) -> Result<(), RepositoryError>;

    /// Fetch all non-deleted rows in `collection` matching `filter`,
    /// applying `options`'s sort/limit/skip.
    async fn find_all(
        &self,
        collection: &str,
        filter: &FilterResult,
        options: &ReadOptions,
        include_deleted: bool,
    ) -> Result<Vec<Document>, RepositoryError>;

    /// Fetch a single row by its primary key.
    async fn find_by_id(
        &self,
        collection: &str,
        id: &DocumentId,
        include_deleted: bool,
    ) -> Result<Option<Document>, RepositoryError>;

    /// Count rows in `collection` matching `filter`.
    async fn count(
        &self,
        collection: &str,
        filter: &FilterResult,
        include_deleted: bool,
    ) -> Result<u64, RepositoryError>;

    /// Insert one new document, stamping audit fields. Returns the full
    /// row as persisted (including server-assigned id/timestamps).
    async fn insert_one(
        &self,
        collection: &str,
        data: Value,
        audit: &AuditContext,
    ) -> Result<Document, RepositoryError>;

    /// Insert several documents in one transaction (spec §4.3 "bulk
    /// create"). Returns their assigned ids in input order.
    async fn insert_many(
        &self,
        collection: &str,
        data: Vec<Value>,
        audit: &AuditContext,
    ) -> Result<Vec<DocumentId>, RepositoryError>;

    /// Apply `merged_data` (the orchestrator's already-merged document
    /// body) to every non-deleted row `filter` matches. Rows whose
    /// stored `data` is byte-identical to `merged_data` are matched but
    /// not counted as modified, and do not advance `version` (spec §4.9
    /// no-op detection).
    async fn update_matching(
        &self,
        collection: &str,
        filter: &FilterResult,
        merged_data: Value,
        audit: &AuditContext,
    ) -> Result<MutationCount, RepositoryError>;

    /// Insert `data` as `collection`'s row if `filter` matches nothing,
    /// else update the single matched row in place. Returns whether a
    /// new row was inserted, the affected id, and matched/modified
    /// counts mirroring [`DocumentRepository::update_matching`].
    async fn upsert_one(
        &self,
        collection: &str,
        filter: &FilterResult,
        data: Value,
        audit: &AuditContext,
    ) -> Result<(bool, DocumentId, MutationCount), RepositoryError>;

    /// Soft-delete every non-deleted row `filter` matches.
    async fn delete_matching(
        &self,
        collection: &str,
        filter: &FilterResult,
        audit: &AuditContext,
    ) -> Result<u64, RepositoryError>;

    /// Unnest the array at `father_path` across every non-deleted
    /// parent `filter` matches, one row per array element
    /// (`json_array_expand`), soft-deleted parents excluded (spec §4.2
    /// "find_nested", §4.8 "nested endpoint ... uses `find_nested`").
    /// `filter` and `options` scope the parent rows only; pushing a
    /// predicate down into the array elements themselves is out of
    /// scope (see `DESIGN.md`).
    async fn find_nested(
        &self,
        collection: &str,
        father_path: &str,
        filter: &FilterResult,
        options: &ReadOptions,
    ) -> Result<Vec<Document>, RepositoryError>;

    /// Fetch up to `limit` rows in `collection` with
    /// `sequence_number > after`, ascending — one page of the change
    /// feed (spec §4.8).
    async fn next_sequence_page(
        &self,
        collection: &str,
        after: i64,
        limit: u32,
    ) -> Result<Vec<Document>, RepositoryError>;

    /// Load the durable resume position for `collection`'s change-feed
    /// consumer, if one has been saved.
    async fn load_checkpoint(&self, collection: &str) -> Result<Option<SequenceCheckpoint>, RepositoryError>;

    /// Persist `checkpoint`, replacing any prior value for its
    /// collection.
    async fn save_checkpoint(&self, checkpoint: &SequenceCheckpoint) -> Result<(), RepositoryError>;
}

/// Column expression for a sort key: `_id` sorts on the raw integer
/// column, everything else is a JSON path under `data`.
pub(crate) fn column_for_sort(dialect: &dyn SqlDialect, field: &str) -> String {
    if field == "_id" {
        "id".to_string()
    } else {
        dialect.json_extract_text("data", field)
    }
}
