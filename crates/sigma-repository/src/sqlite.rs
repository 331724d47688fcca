//! SQLite [`DocumentRepository`] implementation.
//!
//! Stands in for the embeddable/dev-mode role `spec.md` assigns to H2
//! (see `/root/crate/DESIGN.md`, OQ-1). Differs from
//! [`crate::PostgresRepository`] mainly in row decoding: `data` is
//! stored as `TEXT` and parsed explicitly, timestamps are RFC 3339
//! strings, and booleans are 0/1 integers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use sigma_dialect::{SqlDialect, SqliteDialect};
use sigma_filter::{FilterResult, ReadOptions};
use sigma_types::{AuditContext, Document, DocumentId, SequenceCheckpoint};

use crate::bind::bind_all;
use crate::error::RepositoryError;
use crate::sql;
use crate::{DocumentRepository, MutationCount};

/// Repository backed by a `sqlx::SqlitePool`.
pub struct SqliteRepository {
    pool: SqlitePool,
    dialect: SqliteDialect,
}

impl SqliteRepository {
    /// Wrap an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool, dialect: SqliteDialect::default() }
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Timestamp(e.to_string()))
}

fn decode_row(row: &SqliteRow) -> Result<Document, RepositoryError> {
    let raw_data: String = row.try_get("data")?;
    let data: Value = serde_json::from_str(&raw_data)?;
    let is_deleted: i64 = row.try_get("is_deleted")?;
    let created_at: String = row.try_get("created_at")?;
    let last_modified_at: String = row.try_get("last_modified_at")?;
    Ok(Document {
        id: DocumentId(row.try_get::<i64, _>("id")?.to_string()),
        table_name: row.try_get("table_name")?,
        data,
        version: row.try_get("version")?,
        is_deleted: is_deleted != 0,
        latest_request_id: row.try_get("latest_request_id")?,
        created_by: row.try_get("created_by")?,
        last_modified_by: row.try_get("last_modified_by")?,
        created_at: parse_timestamp(&created_at)?,
        last_modified_at: parse_timestamp(&last_modified_at)?,
        sequence_number: row.try_get("sequence_number")?,
    })
}

/// Same shape as [`decode_row`], but `data` becomes the expanded array
/// element and `id` is overridden by the element's own `myId` when it
/// has one — the virtual-document wrapping `find_nested`'s callers
/// expect. `json_each`'s `value` column comes back as serialized JSON
/// text for object/array elements, same as the base `data` column.
fn decode_nested_row(row: &SqliteRow) -> Result<Document, RepositoryError> {
    let mut doc = decode_row(row)?;
    let raw_item: String = row.try_get("item_value")?;
    let item_value: Value = serde_json::from_str(&raw_item)?;
    if let Some(my_id) = item_value.get("myId").and_then(|v| v.as_str()) {
        doc.id = DocumentId(my_id.to_string());
    }
    doc.data = item_value;
    Ok(doc)
}

#[async_trait]
impl DocumentRepository for SqliteRepository {
    fn dialect(&self) -> &dyn SqlDialect {
        &self.dialect
    }

    async fn ensure_schema(&self) -> Result<(), RepositoryError> {
        for stmt in self.dialect.ddl_for_documents_table() {
            sqlx::query(&stmt).execute(&self.pool).await?;
        }
        for stmt in self.dialect.ddl_for_sequence_trigger() {
            sqlx::query(&stmt).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn find_all(
        &self,
        collection: &str,
        filter: &FilterResult,
        options: &ReadOptions,
        include_deleted: bool,
    ) -> Result<Vec<Document>, RepositoryError> {
        let sql = sql::select_documents(
            &self.dialect,
            "?",
            &filter.where_clause,
            include_deleted,
            options.sort.as_ref(),
            options.limit,
            options.skip,
        );
        let query = sqlx::query(&sql).bind(collection);
        let query = bind_all(query, &filter.params);
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(decode_row).collect()
    }

    async fn find_by_id(
        &self,
        collection: &str,
        id: &DocumentId,
        include_deleted: bool,
    ) -> Result<Option<Document>, RepositoryError> {
        let id_num: i64 = id.as_str().parse().map_err(|_| RepositoryError::NotFound)?;
        let mut sql = "SELECT ".to_string();
        sql.push_str(sql::DOCUMENT_COLUMNS);
        sql.push_str(" FROM dynamic_documents WHERE table_name = ? AND id = ?");
        if !include_deleted {
            sql.push_str(&format!(" AND {}", self.dialect.bool_column_eq("is_deleted", false)));
        }
        let row = sqlx::query(&sql)
            .bind(collection)
            .bind(id_num)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(decode_row).transpose()
    }

    async fn find_nested(
        &self,
        collection: &str,
        father_path: &str,
        filter: &FilterResult,
        options: &ReadOptions,
    ) -> Result<Vec<Document>, RepositoryError> {
        let sql = sql::select_nested_items(
            &self.dialect,
            "?",
            &filter.where_clause,
            father_path,
            options.sort.as_ref(),
            options.limit,
            options.skip,
        );
        let query = sqlx::query(&sql).bind(collection);
        let query = bind_all(query, &filter.params);
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(decode_nested_row).collect()
    }

    async fn count(
        &self,
        collection: &str,
        filter: &FilterResult,
        include_deleted: bool,
    ) -> Result<u64, RepositoryError> {
        let sql = sql::count_documents(&self.dialect, "?", &filter.where_clause, include_deleted);
        let query = sqlx::query(&sql).bind(collection);
        let query = bind_all(query, &filter.params);
        let row = query.fetch_one(&self.pool).await?;
        let total: i64 = row.try_get("total")?;
        Ok(total as u64)
    }

    async fn insert_one(
        &self,
        collection: &str,
        data: Value,
        audit: &AuditContext,
    ) -> Result<Document, RepositoryError> {
        let sql = sql::insert_document(&self.dialect);
        let serialized = serde_json::to_string(&data)?;
        let result = sqlx::query(&sql)
            .bind(collection)
            .bind(&serialized)
            .bind(&audit.auditor)
            .bind(&audit.auditor)
            .bind(&audit.request_id)
            .execute(&self.pool)
            .await?;
        let id = result.last_insert_rowid();
        self.find_by_id(collection, &DocumentId(id.to_string()), true)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    async fn insert_many(
        &self,
        collection: &str,
        data: Vec<Value>,
        audit: &AuditContext,
    ) -> Result<Vec<DocumentId>, RepositoryError> {
        let sql = sql::insert_document(&self.dialect);
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(data.len());
        for item in data {
            let serialized = serde_json::to_string(&item)?;
            let result = sqlx::query(&sql)
                .bind(collection)
                .bind(&serialized)
                .bind(&audit.auditor)
                .bind(&audit.auditor)
                .bind(&audit.request_id)
                .execute(&mut *tx)
                .await?;
            ids.push(DocumentId(result.last_insert_rowid().to_string()));
        }
        tx.commit().await?;
        Ok(ids)
    }

    async fn update_matching(
        &self,
        collection: &str,
        filter: &FilterResult,
        merged_data: Value,
        audit: &AuditContext,
    ) -> Result<MutationCount, RepositoryError> {
        let tail_start = 2 + filter.params.len();
        let sql = sql::update_documents(&self.dialect, "?", &filter.where_clause, tail_start);
        let matched = self.count(collection, filter, false).await?;
        let serialized = serde_json::to_string(&merged_data)?;

        let query = sqlx::query(&sql).bind(collection);
        let query = bind_all(query, &filter.params);
        let query = query.bind(&serialized).bind(&audit.auditor).bind(&audit.request_id);
        let result = query.execute(&self.pool).await?;
        Ok(MutationCount { matched, modified: result.rows_affected() })
    }

    async fn upsert_one(
        &self,
        collection: &str,
        filter: &FilterResult,
        data: Value,
        audit: &AuditContext,
    ) -> Result<(bool, DocumentId, MutationCount), RepositoryError> {
        let matched = self.count(collection, filter, false).await?;
        if matched == 0 {
            let doc = self.insert_one(collection, data, audit).await?;
            return Ok((true, doc.id, MutationCount { matched: 0, modified: 1 }));
        }

        let rows = self.find_all(collection, filter, &ReadOptions { limit: Some(1), ..Default::default() }, false).await?;
        let target = rows.into_iter().next().ok_or(RepositoryError::NotFound)?;
        let outcome = self.update_matching(collection, filter, data, audit).await?;
        Ok((false, target.id, outcome))
    }

    async fn delete_matching(
        &self,
        collection: &str,
        filter: &FilterResult,
        audit: &AuditContext,
    ) -> Result<u64, RepositoryError> {
        let tail_start = 2 + filter.params.len();
        let sql = sql::soft_delete_documents(&self.dialect, "?", &filter.where_clause, tail_start);
        let query = sqlx::query(&sql).bind(collection);
        let query = bind_all(query, &filter.params);
        let query = query.bind(&audit.auditor).bind(&audit.request_id);
        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn next_sequence_page(
        &self,
        collection: &str,
        after: i64,
        limit: u32,
    ) -> Result<Vec<Document>, RepositoryError> {
        let sql = sql::sequence_page(&self.dialect, limit);
        let rows = sqlx::query(&sql)
            .bind(collection)
            .bind(after)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(decode_row).collect()
    }

    async fn load_checkpoint(&self, collection: &str) -> Result<Option<SequenceCheckpoint>, RepositoryError> {
        let row = sqlx::query(
            "SELECT collection, sequence, resume_token, last_updated FROM sequence_checkpoints WHERE collection = ?",
        )
        .bind(collection)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|row| {
            let updated_raw: String = row.try_get("last_updated")?;
            Ok(SequenceCheckpoint {
                collection: row.try_get("collection")?,
                sequence: row.try_get("sequence")?,
                resume_token: row.try_get("resume_token")?,
                updated_at: parse_timestamp(&updated_raw)?,
            })
        })
        .transpose()
    }

    async fn save_checkpoint(&self, checkpoint: &SequenceCheckpoint) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO sequence_checkpoints (collection, sequence, resume_token, last_updated) \
             VALUES (?, ?, ?, strftime('%Y-%m-%dT%H:%M:%fZ', 'now')) \
             ON CONFLICT(collection) DO UPDATE SET sequence = excluded.sequence, \
             resume_token = excluded.resume_token, last_updated = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
        )
        .bind(&checkpoint.collection)
        .bind(checkpoint.sequence)
        .bind(&checkpoint.resume_token)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ensure_schema_and_round_trip_insert_find() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let repo = SqliteRepository::new(pool);
        repo.ensure_schema().await.unwrap();

        let audit = AuditContext { auditor: "tester".into(), request_id: "r1".into() };
        let doc = repo
            .insert_one("widgets", serde_json::json!({"name": "gadget"}), &audit)
            .await
            .unwrap();
        assert_eq!(doc.data["name"], "gadget");
        assert_eq!(doc.version, 0);

        let fetched = repo.find_by_id("widgets", &doc.id, false).await.unwrap().unwrap();
        assert_eq!(fetched.id, doc.id);
    }
}
