use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::features::ocr::models::{OcrState, OcrStatus};

/// Database model for documents
#[derive(Debug, Clone, FromRow)]
pub struct Document {
    pub id: Uuid,
    pub owner_id: String,
    pub title: String,
    /// Lowercase hex SHA-256 of the file bytes
    pub content_fingerprint: String,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub storage_key: String,
    pub file_url: String,
    pub ocr_enabled: bool,
    pub ocr_status: OcrStatus,
    pub ocr_text: Option<String>,
    pub ocr_error: Option<String>,
    pub ocr_retry_count: i32,
    pub ocr_started_at: Option<DateTime<Utc>>,
    pub ocr_completed_at: Option<DateTime<Utc>>,
    pub folder_id: Option<Uuid>,
    pub public_link_id: Option<Uuid>,
    pub is_public: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn ocr_state(&self) -> OcrState {
        OcrState {
            status: self.ocr_status,
            enabled: self.ocr_enabled,
            retry_count: self.ocr_retry_count,
            text: self.ocr_text.clone(),
            error: self.ocr_error.clone(),
            started_at: self.ocr_started_at,
            completed_at: self.ocr_completed_at,
        }
    }
}

/// Insert payload for a new document
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub owner_id: String,
    pub title: String,
    pub content_fingerprint: String,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub storage_key: String,
    pub file_url: String,
    pub folder_id: Option<Uuid>,
    pub ocr: OcrState,
}
