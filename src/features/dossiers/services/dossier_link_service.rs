use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::auth::model::AuthenticatedUser;
use crate::features::documents::models::Document;
use crate::features::documents::stores::DocumentStore;
use crate::features::dossiers::models::{
    Dossier, DossierFolderLink, DossierLink, NewDossierFolderLink, NewDossierLink,
};
use crate::features::dossiers::stores::{DossierStore, LinkInsert};

/// Enforces that a document belongs to at most one dossier.
///
/// The pre-check only produces a friendlier error; the database unique
/// constraint is what actually decides concurrent attempts.
pub struct DossierLinkService {
    dossiers: Arc<dyn DossierStore>,
    documents: Arc<dyn DocumentStore>,
}

impl DossierLinkService {
    pub fn new(dossiers: Arc<dyn DossierStore>, documents: Arc<dyn DocumentStore>) -> Self {
        Self {
            dossiers,
            documents,
        }
    }

    pub async fn link_document(
        &self,
        dossier_id: Uuid,
        document_id: Uuid,
        user: &AuthenticatedUser,
    ) -> Result<DossierLink> {
        self.accessible_dossier(dossier_id, user).await?;

        let document = self
            .documents
            .find_by_id(document_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Document {} not found", document_id)))?;
        if !user.can_access(&document.owner_id) {
            return Err(AppError::Forbidden(
                "You do not have permission to file this document".to_string(),
            ));
        }

        if let Some(existing) = self.dossiers.find_link_by_document(document_id).await? {
            return Err(AppError::DocumentAlreadyLinked {
                document_id,
                dossier_id: existing.dossier_id,
            });
        }

        let request = NewDossierLink {
            document_id,
            dossier_id,
            created_by: user.sub.clone(),
        };

        match self.dossiers.insert_link(&request).await? {
            LinkInsert::Created { link, event } => {
                info!(
                    "Document {} linked to dossier {} (event {})",
                    document_id, dossier_id, event.id
                );
                Ok(link)
            }
            LinkInsert::AlreadyLinked => {
                // Lost the race to a concurrent link; report who won
                let winner = self.dossiers.find_link_by_document(document_id).await?;
                match winner {
                    Some(winner) => Err(AppError::DocumentAlreadyLinked {
                        document_id,
                        dossier_id: winner.dossier_id,
                    }),
                    None => {
                        warn!(
                            "Link for document {} vanished after a unique violation",
                            document_id
                        );
                        Err(AppError::Conflict(
                            "The document was being moved concurrently, please try again"
                                .to_string(),
                        ))
                    }
                }
            }
        }
    }

    pub async fn unlink_document(&self, link_id: Uuid, user: &AuthenticatedUser) -> Result<()> {
        let link = self
            .dossiers
            .find_link(link_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Link {} not found", link_id)))?;
        self.accessible_dossier(link.dossier_id, user).await?;

        let (link, event) = self
            .dossiers
            .delete_link(link_id, &user.sub)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Link {} not found", link_id)))?;

        info!(
            "Document {} removed from dossier {} (event {})",
            link.document_id, link.dossier_id, event.id
        );
        Ok(())
    }

    pub async fn link_folder(
        &self,
        dossier_id: Uuid,
        folder_id: Uuid,
        user: &AuthenticatedUser,
    ) -> Result<DossierFolderLink> {
        self.accessible_dossier(dossier_id, user).await?;

        let request = NewDossierFolderLink {
            dossier_id,
            folder_id,
            created_by: user.sub.clone(),
        };

        match self.dossiers.insert_folder_link(&request).await? {
            LinkInsert::Created { link, .. } => {
                info!("Folder {} linked to dossier {}", folder_id, dossier_id);
                Ok(link)
            }
            LinkInsert::AlreadyLinked => Err(AppError::Conflict(format!(
                "Folder {} is already linked to this dossier",
                folder_id
            ))),
        }
    }

    pub async fn unlink_folder(&self, link_id: Uuid, user: &AuthenticatedUser) -> Result<()> {
        let link = self
            .dossiers
            .find_folder_link(link_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Folder link {} not found", link_id)))?;
        self.accessible_dossier(link.dossier_id, user).await?;

        self.dossiers
            .delete_folder_link(link_id, &user.sub)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Folder link {} not found", link_id)))?;

        info!(
            "Folder {} removed from dossier {}",
            link.folder_id, link.dossier_id
        );
        Ok(())
    }

    /// Documents the user could still file into a dossier.
    ///
    /// Only a hint for pickers; [`Self::link_document`] re-checks everything.
    pub async fn available_documents(&self, user: &AuthenticatedUser) -> Result<Vec<Document>> {
        self.dossiers.list_unlinked_documents(&user.sub).await
    }

    async fn accessible_dossier(&self, dossier_id: Uuid, user: &AuthenticatedUser) -> Result<Dossier> {
        let dossier = self
            .dossiers
            .find_dossier(dossier_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Dossier {} not found", dossier_id)))?;

        if !user.can_access(&dossier.owner_id) {
            return Err(AppError::Forbidden(
                "You do not have permission to change this dossier".to_string(),
            ));
        }

        Ok(dossier)
    }
}
