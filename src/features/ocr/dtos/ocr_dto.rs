use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::core::error::AppError;
use crate::features::documents::models::Document;
use crate::features::ocr::models::OcrStatus;

/// Most documents one status stream may watch
pub const MAX_STREAM_DOCUMENTS: usize = 50;

/// OCR side of a document after a transition
#[derive(Debug, Serialize, ToSchema)]
pub struct OcrJobResponseDto {
    pub document_id: Uuid,
    pub status: OcrStatus,
    pub enabled: bool,
    pub retry_count: i32,
    pub error: Option<String>,
    pub has_text: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl From<Document> for OcrJobResponseDto {
    fn from(d: Document) -> Self {
        Self {
            document_id: d.id,
            status: d.ocr_status,
            enabled: d.ocr_enabled,
            retry_count: d.ocr_retry_count,
            error: d.ocr_error,
            has_text: d.ocr_text.is_some(),
            started_at: d.ocr_started_at,
            completed_at: d.ocr_completed_at,
            updated_at: d.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct OcrStreamQuery {
    /// Comma separated document ids
    pub ids: String,
}

impl OcrStreamQuery {
    pub fn document_ids(&self) -> Result<Vec<Uuid>, AppError> {
        let mut ids = Vec::new();
        for raw in self.ids.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let id = Uuid::parse_str(raw)
                .map_err(|_| AppError::Validation(format!("Invalid document id '{}'", raw)))?;
            if !ids.contains(&id) {
                ids.push(id);
            }
        }

        if ids.is_empty() {
            return Err(AppError::Validation(
                "At least one document id is required".to_string(),
            ));
        }
        if ids.len() > MAX_STREAM_DOCUMENTS {
            return Err(AppError::Validation(format!(
                "At most {} documents can be watched at once",
                MAX_STREAM_DOCUMENTS
            )));
        }

        Ok(ids)
    }
}

/// Worker report: extraction finished
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CompleteOcrDto {
    /// Extracted text; may be empty for blank pages
    #[validate(length(max = 2000000, message = "text is too long"))]
    pub text: String,
}

/// Worker report: extraction failed
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct FailOcrDto {
    #[validate(length(min = 1, max = 2000, message = "reason must be 1-2000 characters"))]
    pub reason: String,
}
