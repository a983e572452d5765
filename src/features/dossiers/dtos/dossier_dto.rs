use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::features::documents::models::Document;
use crate::features::dossiers::models::{Dossier, DossierEvent, DossierStateUpdate};

#[derive(Debug, Deserialize, ToSchema)]
pub struct LinkDocumentDto {
    pub document_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LinkFolderDto {
    pub folder_id: Uuid,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddNoteDto {
    #[validate(length(min = 1, max = 5000, message = "text must be 1-5000 characters"))]
    pub text: String,
}

/// Omitted fields stay unchanged
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateDossierStateDto {
    #[validate(length(min = 1, max = 50, message = "status must be 1-50 characters"))]
    pub status: Option<String>,
    #[validate(length(min = 1, max = 50, message = "phase must be 1-50 characters"))]
    pub phase: Option<String>,
    #[validate(length(min = 1, max = 50, message = "admin_state must be 1-50 characters"))]
    pub admin_state: Option<String>,
}

impl From<UpdateDossierStateDto> for DossierStateUpdate {
    fn from(dto: UpdateDossierStateDto) -> Self {
        Self {
            status: dto.status,
            phase: dto.phase,
            admin_state: dto.admin_state,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DossierStateResponseDto {
    pub dossier: Dossier,
    /// One event per field that actually changed
    pub events: Vec<DossierEvent>,
}

/// Document that can still be filed into a dossier
#[derive(Debug, Serialize, ToSchema)]
pub struct AvailableDocumentDto {
    pub id: Uuid,
    pub title: String,
    pub file_name: String,
    pub mime_type: String,
    pub folder_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<Document> for AvailableDocumentDto {
    fn from(d: Document) -> Self {
        Self {
            id: d.id,
            title: d.title,
            file_name: d.file_name,
            mime_type: d.mime_type,
            folder_id: d.folder_id,
            created_at: d.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UnlinkResponseDto {
    pub removed: bool,
}
