//! PostgreSQL [`DocumentRepository`] implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{postgres::PgRow, PgPool, Row};

use sigma_dialect::{PostgresDialect, SqlDialect};
use sigma_filter::{FilterResult, ReadOptions};
use sigma_types::{AuditContext, Document, DocumentId, SequenceCheckpoint};

use crate::bind::bind_all;
use crate::error::RepositoryError;
use crate::sql;
use crate::{DocumentRepository, MutationCount};

/// Repository backed by a `sqlx::PgPool`.
pub struct PostgresRepository {
    pool: PgPool,
    dialect: PostgresDialect,
}

impl PostgresRepository {
    /// Wrap an existing pool. Callers typically build the pool once at
    /// startup (spec §6 "Connection lifecycle") and share it across the
    /// gateway's `AppState`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool, dialect: PostgresDialect::default() }
    }
}

fn decode_row(row: &PgRow) -> Result<Document, RepositoryError> {
    let data: Value = row.try_get("data")?;
    Ok(Document {
        id: DocumentId(row.try_get::<i64, _>("id")?.to_string()),
        table_name: row.try_get("table_name")?,
        data,
        version: row.try_get("version")?,
        is_deleted: row.try_get("is_deleted")?,
        latest_request_id: row.try_get("latest_request_id")?,
        created_by: row.try_get("created_by")?,
        last_modified_by: row.try_get("last_modified_by")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        last_modified_at: row.try_get::<DateTime<Utc>, _>("last_modified_at")?,
        sequence_number: row.try_get("sequence_number")?,
    })
}

/// Same shape as [`decode_row`], but `data` becomes the expanded array
/// element and `id` is overridden by the element's own `myId` when it
/// has one — the virtual-document wrapping `find_nested`'s callers
/// expect.
fn decode_nested_row(row: &PgRow) -> Result<Document, RepositoryError> {
    let mut doc = decode_row(row)?;
    let item_value: Value = row.try_get("item_value")?;
    if let Some(my_id) = item_value.get("myId").and_then(|v| v.as_str()) {
        doc.id = DocumentId(my_id.to_string());
    }
    doc.data = item_value;
    Ok(doc)
}

#[async_trait]
impl DocumentRepository for PostgresRepository {
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
            "$1",
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
        sql.push_str(" FROM dynamic_documents WHERE table_name = $1 AND id = $2");
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
            "$1",
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
        let sql = sql::count_documents(&self.dialect, "$1", &filter.where_clause, include_deleted);
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
        let row = sqlx::query(&sql)
            .bind(collection)
            .bind(&data)
            .bind(&audit.auditor)
            .bind(&audit.auditor)
            .bind(&audit.request_id)
            .fetch_one(&self.pool)
            .await?;
        let id: i64 = row.try_get("id")?;
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
            let row = sqlx::query(&sql)
                .bind(collection)
                .bind(&item)
                .bind(&audit.auditor)
                .bind(&audit.auditor)
                .bind(&audit.request_id)
                .fetch_one(&mut *tx)
                .await?;
            let id: i64 = row.try_get("id")?;
            ids.push(DocumentId(id.to_string()));
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
        let sql = sql::update_documents(&self.dialect, "$1", &filter.where_clause, tail_start);
        let matched = self.count(collection, filter, false).await?;

        let query = sqlx::query(&sql).bind(collection);
        let query = bind_all(query, &filter.params);
        let query = query.bind(&merged_data).bind(&audit.auditor).bind(&audit.request_id);
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
        let sql = sql::soft_delete_documents(&self.dialect, "$1", &filter.where_clause, tail_start);
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
            "SELECT collection, sequence, resume_token, last_updated FROM sequence_checkpoints WHERE collection = $1",
        )
        .bind(collection)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|row| {
            Ok(SequenceCheckpoint {
                collection: row.try_get("collection")?,
                sequence: row.try_get("sequence")?,
                resume_token: row.try_get("resume_token")?,
                updated_at: row.try_get::<DateTime<Utc>, _>("last_updated")?,
            })
        })
        .transpose()
    }

    async fn save_checkpoint(&self, checkpoint: &SequenceCheckpoint) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO sequence_checkpoints (collection, sequence, resume_token, last_updated) \
             VALUES ($1, $2, $3, now()) \
             ON CONFLICT (collection) DO UPDATE SET sequence = EXCLUDED.sequence, \
             resume_token = EXCLUDED.resume_token, last_updated = now()",
        )
        .bind(&checkpoint.collection)
        .bind(checkpoint.sequence)
        .bind(&checkpoint.resume_token)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
