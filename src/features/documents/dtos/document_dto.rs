use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::features::documents::models::Document;
use crate::features::documents::services::IngestionOutcome;
use crate::features::ocr::models::OcrStatus;

/// Upload form for OpenAPI documentation.
/// The handler reads the multipart stream directly.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UploadDocumentDto {
    /// PDF, PNG or JPEG, at most 15 MiB
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub file: String,
    /// Required, at most 255 characters
    #[schema(example = "March invoice")]
    pub title: String,
    /// Queue text extraction right away
    #[schema(example = "true")]
    pub ocr_enabled: Option<String>,
    /// Comma separated tag ids
    pub tag_ids: Option<String>,
    pub folder_id: Option<Uuid>,
    /// `ask` (default), `continue` or `cancel`
    #[schema(example = "ask")]
    pub duplicate_decision: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DocumentResponseDto {
    pub id: Uuid,
    pub owner_id: String,
    pub title: String,
    pub content_fingerprint: String,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub file_url: String,
    pub folder_id: Option<Uuid>,
    pub is_public: bool,
    pub ocr_enabled: bool,
    pub ocr_status: OcrStatus,
    pub ocr_text: Option<String>,
    pub ocr_error: Option<String>,
    pub ocr_retry_count: i32,
    pub ocr_started_at: Option<DateTime<Utc>>,
    pub ocr_completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Document> for DocumentResponseDto {
    fn from(d: Document) -> Self {
        Self {
            id: d.id,
            owner_id: d.owner_id,
            title: d.title,
            content_fingerprint: d.content_fingerprint,
            file_name: d.file_name,
            file_size: d.file_size,
            mime_type: d.mime_type,
            file_url: d.file_url,
            folder_id: d.folder_id,
            is_public: d.is_public,
            ocr_enabled: d.ocr_enabled,
            ocr_status: d.ocr_status,
            ocr_text: d.ocr_text,
            ocr_error: d.ocr_error,
            ocr_retry_count: d.ocr_retry_count,
            ocr_started_at: d.ocr_started_at,
            ocr_completed_at: d.ocr_completed_at,
            created_at: d.created_at,
            updated_at: d.updated_at,
        }
    }
}

/// Existing document the upload matched
#[derive(Debug, Serialize, ToSchema)]
pub struct DuplicateMatchDto {
    pub id: Uuid,
    pub title: String,
    pub file_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UploadResponseDto {
    Created {
        document: DocumentResponseDto,
        warnings: Vec<String>,
    },
    /// Nothing was written; resend with `duplicate_decision=continue` to keep both
    DuplicateFound {
        existing: DuplicateMatchDto,
        fingerprint: String,
    },
    Cancelled,
}

impl UploadResponseDto {
    /// Split an outcome into the response body and its user-facing message
    pub fn from_outcome(outcome: IngestionOutcome) -> (Self, String) {
        match outcome {
            IngestionOutcome::Created {
                document,
                warnings,
                message,
            } => (
                UploadResponseDto::Created {
                    document: document.into(),
                    warnings,
                },
                message,
            ),
            IngestionOutcome::DuplicateFound {
                existing,
                fingerprint,
            } => {
                let message = format!(
                    "This file was already uploaded as \"{}\" ({})",
                    existing.title, existing.file_name
                );
                (
                    UploadResponseDto::DuplicateFound {
                        existing: DuplicateMatchDto {
                            id: existing.id,
                            title: existing.title,
                            file_name: existing.file_name,
                            created_at: existing.created_at,
                        },
                        fingerprint,
                    },
                    message,
                )
            }
            IngestionOutcome::Cancelled => (
                UploadResponseDto::Cancelled,
                "Upload cancelled".to_string(),
            ),
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, UploadResponseDto::Created { .. })
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteDocumentResponseDto {
    pub deleted: bool,
}
