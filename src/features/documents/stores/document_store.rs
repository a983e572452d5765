use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::error::Result;
use crate::features::documents::models::{Document, NewDocument};
use crate::features::ocr::models::OcrState;

const DOCUMENT_COLUMNS: &str = r#"
    id, owner_id, title, content_fingerprint, file_name, file_size, mime_type,
    storage_key, file_url, ocr_enabled, ocr_status, ocr_text, ocr_error,
    ocr_retry_count, ocr_started_at, ocr_completed_at, folder_id, public_link_id,
    is_public, deleted_at, created_at, updated_at
"#;

/// Persistence for documents. Every read ignores soft-deleted rows.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert(&self, doc: &NewDocument) -> Result<Document>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Document>>;

    /// Newest non-deleted document of `owner_id` with this fingerprint
    async fn find_by_fingerprint(&self, owner_id: &str, fingerprint: &str)
        -> Result<Option<Document>>;

    async fn link_tags(&self, document_id: Uuid, tag_ids: &[Uuid]) -> Result<()>;

    /// Write `next` only if the row's status, enabled flag and retry count
    /// still match `expected`. Transitions that keep the status (requeue,
    /// disable) are fenced by the other two columns.
    ///
    /// Returns `None` when another writer moved the job first.
    async fn update_ocr(
        &self,
        id: Uuid,
        expected: &OcrState,
        next: &OcrState,
    ) -> Result<Option<Document>>;

    /// Enabled queued jobs untouched since `older_than`, oldest first
    async fn list_stuck_queued(
        &self,
        older_than: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Document>>;

    /// Returns false when the document does not exist or is already deleted
    async fn soft_delete(&self, id: Uuid) -> Result<bool>;
}

pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn insert(&self, doc: &NewDocument) -> Result<Document> {
        let sql = format!(
            r#"
            INSERT INTO documents (
                id, owner_id, title, content_fingerprint, file_name, file_size, mime_type,
                storage_key, file_url, folder_id, ocr_enabled, ocr_status, ocr_retry_count,
                ocr_started_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {DOCUMENT_COLUMNS}
            "#
        );

        let document = sqlx::query_as::<_, Document>(&sql)
            .bind(Uuid::now_v7())
            .bind(&doc.owner_id)
            .bind(&doc.title)
            .bind(&doc.content_fingerprint)
            .bind(&doc.file_name)
            .bind(doc.file_size)
            .bind(&doc.mime_type)
            .bind(&doc.storage_key)
            .bind(&doc.file_url)
            .bind(doc.folder_id)
            .bind(doc.ocr.enabled)
            .bind(doc.ocr.status)
            .bind(doc.ocr.retry_count)
            .bind(doc.ocr.started_at)
            .fetch_one(&self.pool)
            .await?;

        Ok(document)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Document>> {
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1 AND deleted_at IS NULL"
        );

        let document = sqlx::query_as::<_, Document>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(document)
    }

    async fn find_by_fingerprint(
        &self,
        owner_id: &str,
        fingerprint: &str,
    ) -> Result<Option<Document>> {
        let sql = format!(
            r#"
            SELECT {DOCUMENT_COLUMNS} FROM documents
            WHERE owner_id = $1 AND content_fingerprint = $2 AND deleted_at IS NULL
            ORDER BY created_at DESC
            LIMIT 1
            "#
        );

        let document = sqlx::query_as::<_, Document>(&sql)
            .bind(owner_id)
            .bind(fingerprint)
            .fetch_optional(&self.pool)
            .await?;

        Ok(document)
    }

    async fn link_tags(&self, document_id: Uuid, tag_ids: &[Uuid]) -> Result<()> {
        if tag_ids.is_empty() {
            return Ok(());
        }

        sqlx::query(
            r#"
            INSERT INTO document_tags (document_id, tag_id)
            SELECT $1, UNNEST($2::uuid[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(document_id)
        .bind(tag_ids)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_ocr(
        &self,
        id: Uuid,
        expected: &OcrState,
        next: &OcrState,
    ) -> Result<Option<Document>> {
        let sql = format!(
            r#"
            UPDATE documents
            SET ocr_status = $5,
                ocr_enabled = $6,
                ocr_retry_count = $7,
                ocr_text = $8,
                ocr_error = $9,
                ocr_started_at = $10,
                ocr_completed_at = $11,
                updated_at = NOW()
            WHERE id = $1
              AND ocr_status = $2
              AND ocr_enabled = $3
              AND ocr_retry_count = $4
              AND deleted_at IS NULL
            RETURNING {DOCUMENT_COLUMNS}
            "#
        );

        let document = sqlx::query_as::<_, Document>(&sql)
            .bind(id)
            .bind(expected.status)
            .bind(expected.enabled)
            .bind(expected.retry_count)
            .bind(next.status)
            .bind(next.enabled)
            .bind(next.retry_count)
            .bind(&next.text)
            .bind(&next.error)
            .bind(next.started_at)
            .bind(next.completed_at)
            .fetch_optional(&self.pool)
            .await?;

        Ok(document)
    }

    async fn list_stuck_queued(
        &self,
        older_than: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Document>> {
        let sql = format!(
            r#"
            SELECT {DOCUMENT_COLUMNS} FROM documents
            WHERE ocr_enabled = TRUE
              AND ocr_status IN ('queued', 'paused')
              AND updated_at < $1
              AND deleted_at IS NULL
            ORDER BY updated_at ASC
            LIMIT $2
            "#
        );

        let documents = sqlx::query_as::<_, Document>(&sql)
            .bind(older_than)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(documents)
    }

    async fn soft_delete(&self, id: Uuid) -> Result<bool> {
        let deleted: bool = sqlx::query_scalar("SELECT soft_delete_document($1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Ok(deleted)
    }
}
