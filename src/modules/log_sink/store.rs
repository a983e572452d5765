use async_trait::async_trait;
use sqlx::PgPool;

use super::entry::LogEntry;
use crate::core::error::Result;

/// Destination for flushed log batches
#[async_trait]
pub trait LogStore: Send + Sync {
    async fn write_batch(&self, entries: &[LogEntry]) -> Result<()>;
}

pub struct PgLogStore {
    pool: PgPool,
}

impl PgLogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LogStore for PgLogStore {
    async fn write_batch(&self, entries: &[LogEntry]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for entry in entries {
            sqlx::query(
                r#"
                INSERT INTO app_logs (level, source, message, document_id, context, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(entry.level.as_str())
            .bind(&entry.source)
            .bind(&entry.message)
            .bind(entry.document_id)
            .bind(&entry.context)
            .bind(entry.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
