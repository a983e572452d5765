use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::core::database::is_unique_violation;
use crate::core::error::{AppError, Result};
use crate::features::documents::models::Document;
use crate::features::dossiers::models::{
    Dossier, DossierEvent, DossierEventKind, DossierEventRow, DossierFolderLink, DossierLink,
    DossierStateUpdate, NewDossierEvent, NewDossierFolderLink, NewDossierLink,
};

/// Unique index guaranteeing a document sits in at most one dossier
const DOCUMENT_LINK_CONSTRAINT: &str = "dossier_documents_document_id_key";
const FOLDER_LINK_CONSTRAINT: &str = "dossier_folders_dossier_id_folder_id_key";

/// Result of attempting to create a link
#[derive(Debug)]
pub enum LinkInsert<L> {
    Created { link: L, event: DossierEvent },
    /// The unique constraint refused the row; nothing was written
    AlreadyLinked,
}

/// Persistence for dossiers, their links and their event log.
///
/// Every mutation appends its event in the same transaction.
#[async_trait]
pub trait DossierStore: Send + Sync {
    async fn find_dossier(&self, id: Uuid) -> Result<Option<Dossier>>;

    async fn find_link(&self, link_id: Uuid) -> Result<Option<DossierLink>>;

    async fn find_link_by_document(&self, document_id: Uuid) -> Result<Option<DossierLink>>;

    async fn insert_link(&self, link: &NewDossierLink) -> Result<LinkInsert<DossierLink>>;

    /// `None` when the link no longer exists
    async fn delete_link(
        &self,
        link_id: Uuid,
        actor: &str,
    ) -> Result<Option<(DossierLink, DossierEvent)>>;

    async fn find_folder_link(&self, link_id: Uuid) -> Result<Option<DossierFolderLink>>;

    async fn insert_folder_link(
        &self,
        link: &NewDossierFolderLink,
    ) -> Result<LinkInsert<DossierFolderLink>>;

    async fn delete_folder_link(
        &self,
        link_id: Uuid,
        actor: &str,
    ) -> Result<Option<(DossierFolderLink, DossierEvent)>>;

    /// Apply workflow field changes; `None` when the dossier does not exist
    async fn update_state(
        &self,
        dossier_id: Uuid,
        update: &DossierStateUpdate,
        actor: &str,
    ) -> Result<Option<(Dossier, Vec<DossierEvent>)>>;

    async fn append_event(&self, event: &NewDossierEvent) -> Result<DossierEvent>;

    /// Newest first, with the total number of events
    async fn list_events(
        &self,
        dossier_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<DossierEvent>, i64)>;

    /// Owner's documents that are not in any dossier
    async fn list_unlinked_documents(&self, owner_id: &str) -> Result<Vec<Document>>;
}

pub struct PgDossierStore {
    pool: PgPool,
}

impl PgDossierStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const EVENT_COLUMNS: &str = "id, seq, dossier_id, event_type, payload, created_by, created_at";

fn decode_event(row: DossierEventRow) -> Result<DossierEvent> {
    let id = row.id;
    DossierEvent::try_from(row)
        .map_err(|e| AppError::Internal(format!("Corrupt dossier event {}: {}", id, e)))
}

async fn insert_event(
    tx: &mut Transaction<'_, Postgres>,
    event: &NewDossierEvent,
) -> Result<DossierEvent> {
    let (event_type, payload) = event.kind.to_parts();

    let row = sqlx::query_as::<_, DossierEventRow>(&format!(
        r#"
        INSERT INTO dossier_events (id, dossier_id, event_type, payload, created_by)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {EVENT_COLUMNS}
        "#
    ))
    .bind(Uuid::now_v7())
    .bind(event.dossier_id)
    .bind(event_type)
    .bind(payload)
    .bind(&event.created_by)
    .fetch_one(&mut **tx)
    .await?;

    decode_event(row)
}

#[async_trait]
impl DossierStore for PgDossierStore {
    async fn find_dossier(&self, id: Uuid) -> Result<Option<Dossier>> {
        let dossier = sqlx::query_as::<_, Dossier>(
            r#"
            SELECT id, owner_id, title, status, phase, admin_state, created_at, updated_at
            FROM dossiers
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(dossier)
    }

    async fn find_link(&self, link_id: Uuid) -> Result<Option<DossierLink>> {
        let link = sqlx::query_as::<_, DossierLink>(
            "SELECT id, document_id, dossier_id, created_by, created_at FROM dossier_documents WHERE id = $1",
        )
        .bind(link_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(link)
    }

    async fn find_link_by_document(&self, document_id: Uuid) -> Result<Option<DossierLink>> {
        let link = sqlx::query_as::<_, DossierLink>(
            "SELECT id, document_id, dossier_id, created_by, created_at FROM dossier_documents WHERE document_id = $1",
        )
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(link)
    }

    async fn insert_link(&self, link: &NewDossierLink) -> Result<LinkInsert<DossierLink>> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, DossierLink>(
            r#"
            INSERT INTO dossier_documents (id, document_id, dossier_id, created_by)
            VALUES ($1, $2, $3, $4)
            RETURNING id, document_id, dossier_id, created_by, created_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(link.document_id)
        .bind(link.dossier_id)
        .bind(&link.created_by)
        .fetch_one(&mut *tx)
        .await;

        let created = match inserted {
            Ok(created) => created,
            Err(e) if is_unique_violation(&e, DOCUMENT_LINK_CONSTRAINT) => {
                tx.rollback().await?;
                return Ok(LinkInsert::AlreadyLinked);
            }
            Err(e) => return Err(e.into()),
        };

        let event = insert_event(
            &mut tx,
            &NewDossierEvent {
                dossier_id: link.dossier_id,
                kind: DossierEventKind::DocumentAdded {
                    document_id: link.document_id,
                },
                created_by: link.created_by.clone(),
            },
        )
        .await?;

        tx.commit().await?;

        Ok(LinkInsert::Created {
            link: created,
            event,
        })
    }

    async fn delete_link(
        &self,
        link_id: Uuid,
        actor: &str,
    ) -> Result<Option<(DossierLink, DossierEvent)>> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query_as::<_, DossierLink>(
            r#"
            DELETE FROM dossier_documents
            WHERE id = $1
            RETURNING id, document_id, dossier_id, created_by, created_at
            "#,
        )
        .bind(link_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(link) = deleted else {
            tx.rollback().await?;
            return Ok(None);
        };

        let event = insert_event(
            &mut tx,
            &NewDossierEvent {
                dossier_id: link.dossier_id,
                kind: DossierEventKind::DocumentRemoved {
                    document_id: link.document_id,
                },
                created_by: actor.to_string(),
            },
        )
        .await?;

        tx.commit().await?;
        Ok(Some((link, event)))
    }

    async fn find_folder_link(&self, link_id: Uuid) -> Result<Option<DossierFolderLink>> {
        let link = sqlx::query_as::<_, DossierFolderLink>(
            "SELECT id, dossier_id, folder_id, created_by, created_at FROM dossier_folders WHERE id = $1",
        )
        .bind(link_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(link)
    }

    async fn insert_folder_link(
        &self,
        link: &NewDossierFolderLink,
    ) -> Result<LinkInsert<DossierFolderLink>> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, DossierFolderLink>(
            r#"
            INSERT INTO dossier_folders (id, dossier_id, folder_id, created_by)
            VALUES ($1, $2, $3, $4)
            RETURNING id, dossier_id, folder_id, created_by, created_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(link.dossier_id)
        .bind(link.folder_id)
        .bind(&link.created_by)
        .fetch_one(&mut *tx)
        .await;

        let created = match inserted {
            Ok(created) => created,
            Err(e) if is_unique_violation(&e, FOLDER_LINK_CONSTRAINT) => {
                tx.rollback().await?;
                return Ok(LinkInsert::AlreadyLinked);
            }
            Err(e) => return Err(e.into()),
        };

        let event = insert_event(
            &mut tx,
            &NewDossierEvent {
                dossier_id: link.dossier_id,
                kind: DossierEventKind::FolderAdded {
                    folder_id: link.folder_id,
                },
                created_by: link.created_by.clone(),
            },
        )
        .await?;

        tx.commit().await?;

        Ok(LinkInsert::Created {
            link: created,
            event,
        })
    }

    async fn delete_folder_link(
        &self,
        link_id: Uuid,
        actor: &str,
    ) -> Result<Option<(DossierFolderLink, DossierEvent)>> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query_as::<_, DossierFolderLink>(
            r#"
            DELETE FROM dossier_folders
            WHERE id = $1
            RETURNING id, dossier_id, folder_id, created_by, created_at
            "#,
        )
        .bind(link_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(link) = deleted else {
            tx.rollback().await?;
            return Ok(None);
        };

        let event = insert_event(
            &mut tx,
            &NewDossierEvent {
                dossier_id: link.dossier_id,
                kind: DossierEventKind::FolderRemoved {
                    folder_id: link.folder_id,
                },
                created_by: actor.to_string(),
            },
        )
        .await?;

        tx.commit().await?;
        Ok(Some((link, event)))
    }

    async fn update_state(
        &self,
        dossier_id: Uuid,
        update: &DossierStateUpdate,
        actor: &str,
    ) -> Result<Option<(Dossier, Vec<DossierEvent>)>> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, Dossier>(
            r#"
            SELECT id, owner_id, title, status, phase, admin_state, created_at, updated_at
            FROM dossiers
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(dossier_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(current) = current else {
            tx.rollback().await?;
            return Ok(None);
        };

        let changes = DossierEventKind::for_state_change(&current, update);
        if changes.is_empty() {
            tx.rollback().await?;
            return Ok(Some((current, Vec::new())));
        }

        let updated = sqlx::query_as::<_, Dossier>(
            r#"
            UPDATE dossiers
            SET status = COALESCE($2, status),
                phase = COALESCE($3, phase),
                admin_state = COALESCE($4, admin_state),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, owner_id, title, status, phase, admin_state, created_at, updated_at
            "#,
        )
        .bind(dossier_id)
        .bind(&update.status)
        .bind(&update.phase)
        .bind(&update.admin_state)
        .fetch_one(&mut *tx)
        .await?;

        let mut events = Vec::with_capacity(changes.len());
        for kind in changes {
            let event = insert_event(
                &mut tx,
                &NewDossierEvent {
                    dossier_id,
                    kind,
                    created_by: actor.to_string(),
                },
            )
            .await?;
            events.push(event);
        }

        tx.commit().await?;
        Ok(Some((updated, events)))
    }

    async fn append_event(&self, event: &NewDossierEvent) -> Result<DossierEvent> {
        let mut tx = self.pool.begin().await?;
        let event = insert_event(&mut tx, event).await?;
        tx.commit().await?;
        Ok(event)
    }

    async fn list_events(
        &self,
        dossier_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<DossierEvent>, i64)> {
        let rows = sqlx::query_as::<_, DossierEventRow>(&format!(
            r#"
            SELECT {EVENT_COLUMNS}
            FROM dossier_events
            WHERE dossier_id = $1
            ORDER BY seq DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(dossier_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM dossier_events WHERE dossier_id = $1")
                .bind(dossier_id)
                .fetch_one(&self.pool)
                .await?;

        let events = rows
            .into_iter()
            .map(decode_event)
            .collect::<Result<Vec<_>>>()?;

        Ok((events, total))
    }

    async fn list_unlinked_documents(&self, owner_id: &str) -> Result<Vec<Document>> {
        let documents = sqlx::query_as::<_, Document>(
            r#"
            SELECT d.id, d.owner_id, d.title, d.content_fingerprint, d.file_name, d.file_size,
                   d.mime_type, d.storage_key, d.file_url, d.ocr_enabled, d.ocr_status,
                   d.ocr_text, d.ocr_error, d.ocr_retry_count, d.ocr_started_at,
                   d.ocr_completed_at, d.folder_id, d.public_link_id, d.is_public,
                   d.deleted_at, d.created_at, d.updated_at
            FROM documents d
            WHERE d.owner_id = $1
              AND d.deleted_at IS NULL
              AND NOT EXISTS (
                  SELECT 1 FROM dossier_documents dd WHERE dd.document_id = d.id
              )
            ORDER BY d.created_at DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(documents)
    }
}
