use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::OcrStatus;
use crate::features::documents::models::Document;

/// Point-in-time view of a document's OCR job, as pushed to subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OcrSnapshot {
    pub document_id: Uuid,
    pub status: OcrStatus,
    pub enabled: bool,
    pub retry_count: i32,
    pub error: Option<String>,
    /// Whether extracted text is available; the text itself is fetched with the document
    pub has_text: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<&Document> for OcrSnapshot {
    fn from(doc: &Document) -> Self {
        Self {
            document_id: doc.id,
            status: doc.ocr_status,
            enabled: doc.ocr_enabled,
            retry_count: doc.ocr_retry_count,
            error: doc.ocr_error.clone(),
            has_text: doc.ocr_text.is_some(),
            updated_at: doc.updated_at,
        }
    }
}
