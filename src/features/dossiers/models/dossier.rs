use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Database model for dossiers. Dossier CRUD lives elsewhere; this service
/// reads them and edits their workflow fields.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct Dossier {
    pub id: Uuid,
    pub owner_id: String,
    pub title: String,
    pub status: String,
    pub phase: String,
    pub admin_state: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Exclusive document membership (`dossier_documents`)
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct DossierLink {
    pub id: Uuid,
    pub document_id: Uuid,
    pub dossier_id: Uuid,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDossierLink {
    pub document_id: Uuid,
    pub dossier_id: Uuid,
    pub created_by: String,
}

/// Folder association (`dossier_folders`). A folder may belong to many dossiers.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct DossierFolderLink {
    pub id: Uuid,
    pub dossier_id: Uuid,
    pub folder_id: Uuid,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDossierFolderLink {
    pub dossier_id: Uuid,
    pub folder_id: Uuid,
    pub created_by: String,
}

/// Requested workflow field changes; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DossierStateUpdate {
    pub status: Option<String>,
    pub phase: Option<String>,
    pub admin_state: Option<String>,
}

impl DossierStateUpdate {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.phase.is_none() && self.admin_state.is_none()
    }
}
