use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::auth::model::AuthenticatedUser;
use crate::features::dossiers::models::{
    Dossier, DossierEvent, DossierEventKind, DossierStateUpdate, NewDossierEvent,
};
use crate::features::dossiers::stores::DossierStore;
use crate::shared::types::PaginationQuery;

/// Read side of the dossier event log, plus the mutations that only append events
pub struct TimelineService {
    dossiers: Arc<dyn DossierStore>,
}

impl TimelineService {
    pub fn new(dossiers: Arc<dyn DossierStore>) -> Self {
        Self { dossiers }
    }

    /// Newest first. Returns the page and the total number of events.
    pub async fn timeline(
        &self,
        dossier_id: Uuid,
        user: &AuthenticatedUser,
        pagination: &PaginationQuery,
    ) -> Result<(Vec<DossierEvent>, i64)> {
        self.accessible_dossier(dossier_id, user).await?;

        self.dossiers
            .list_events(dossier_id, pagination.offset(), pagination.limit())
            .await
    }

    pub async fn add_note(
        &self,
        dossier_id: Uuid,
        text: &str,
        user: &AuthenticatedUser,
    ) -> Result<DossierEvent> {
        self.accessible_dossier(dossier_id, user).await?;

        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::Validation("Note text is required".to_string()));
        }

        self.dossiers
            .append_event(&NewDossierEvent {
                dossier_id,
                kind: DossierEventKind::Note {
                    text: text.to_string(),
                },
                created_by: user.sub.clone(),
            })
            .await
    }

    pub async fn update_state(
        &self,
        dossier_id: Uuid,
        update: &DossierStateUpdate,
        user: &AuthenticatedUser,
    ) -> Result<(Dossier, Vec<DossierEvent>)> {
        if update.is_empty() {
            return Err(AppError::Validation(
                "At least one of status, phase or admin_state is required".to_string(),
            ));
        }
        self.accessible_dossier(dossier_id, user).await?;

        let (dossier, events) = self
            .dossiers
            .update_state(dossier_id, update, &user.sub)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Dossier {} not found", dossier_id)))?;

        if !events.is_empty() {
            info!(
                "Dossier {} state updated by {} ({} changes)",
                dossier_id,
                user.sub,
                events.len()
            );
        }

        Ok((dossier, events))
    }

    async fn accessible_dossier(&self, dossier_id: Uuid, user: &AuthenticatedUser) -> Result<Dossier> {
        let dossier = self
            .dossiers
            .find_dossier(dossier_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Dossier {} not found", dossier_id)))?;

        if !user.can_access(&dossier.owner_id) {
            return Err(AppError::Forbidden(
                "You do not have access to this dossier".to_string(),
            ));
        }

        Ok(dossier)
    }
}
