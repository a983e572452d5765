use axum::body::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::content_hasher;
use super::duplicate_detector::DuplicateDetector;
use crate::core::error::{AppError, Result};
use crate::features::documents::models::{
    extension_for_mime, normalize_mime_type, validate_upload, Document, NewDocument,
};
use crate::features::documents::stores::DocumentStore;
use crate::features::ocr::models::OcrState;
use crate::features::ocr::services::TriggerDispatcher;
use crate::modules::log_sink::LogSink;
use crate::modules::storage::ObjectStorage;

/// What to do when the uploaded content already exists for this owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateDecision {
    /// Report the duplicate and write nothing
    #[default]
    Ask,
    /// Store a second copy anyway
    Continue,
    /// Abandon the upload
    Cancel,
}

impl FromStr for DuplicateDecision {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "ask" => Ok(DuplicateDecision::Ask),
            "continue" => Ok(DuplicateDecision::Continue),
            "cancel" => Ok(DuplicateDecision::Cancel),
            other => Err(AppError::Validation(format!(
                "Invalid duplicate_decision '{}'. Expected ask, continue or cancel",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub owner_id: String,
    pub title: Option<String>,
    pub file_name: String,
    pub mime_type: String,
    pub data: Bytes,
    pub ocr_requested: bool,
    pub tag_ids: Vec<Uuid>,
    pub folder_id: Option<Uuid>,
    pub duplicate_decision: DuplicateDecision,
}

#[derive(Debug)]
pub enum IngestionOutcome {
    Created {
        document: Document,
        /// Non-fatal problems, e.g. tags that could not be applied
        warnings: Vec<String>,
        message: String,
    },
    DuplicateFound {
        existing: Document,
        fingerprint: String,
    },
    Cancelled,
}

/// Runs an upload through validation, hashing, duplicate check, blob
/// upload, record creation, tagging and the OCR trigger, in that order.
pub struct IngestionService {
    store: Arc<dyn DocumentStore>,
    storage: Arc<dyn ObjectStorage>,
    detector: DuplicateDetector,
    dispatcher: TriggerDispatcher,
    log_sink: LogSink,
}

impl IngestionService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        storage: Arc<dyn ObjectStorage>,
        dispatcher: TriggerDispatcher,
        log_sink: LogSink,
    ) -> Self {
        Self {
            detector: DuplicateDetector::new(store.clone(), log_sink.clone()),
            store,
            storage,
            dispatcher,
            log_sink,
        }
    }

    pub async fn ingest(&self, request: UploadRequest) -> Result<IngestionOutcome> {
        self.ingest_at(request, Utc::now()).await
    }

    async fn ingest_at(&self, request: UploadRequest, now: DateTime<Utc>) -> Result<IngestionOutcome> {
        validate_upload(
            &request.file_name,
            &request.mime_type,
            request.data.len(),
            request.title.as_deref(),
        )?;

        let mime_type = normalize_mime_type(&request.mime_type);
        let fingerprint = content_hasher::fingerprint(request.data.clone()).await?;

        if request.duplicate_decision != DuplicateDecision::Continue {
            if let Some(existing) = self
                .detector
                .find_duplicate(&request.owner_id, &fingerprint)
                .await
            {
                info!(
                    "Upload by {} matches existing document {} ({:?})",
                    request.owner_id, existing.id, request.duplicate_decision
                );
                return Ok(match request.duplicate_decision {
                    DuplicateDecision::Cancel => IngestionOutcome::Cancelled,
                    _ => IngestionOutcome::DuplicateFound {
                        existing,
                        fingerprint,
                    },
                });
            }
        }

        let extension = extension_for_mime(&mime_type).unwrap_or("bin");
        let path = format!(
            "{}/{}.{}",
            request.owner_id,
            now.timestamp_millis(),
            extension
        );
        let stored = self.storage.put(&path, &request.data, &mime_type).await?;

        let new_document = NewDocument {
            owner_id: request.owner_id.clone(),
            title: request.title.as_deref().unwrap_or_default().trim().to_string(),
            content_fingerprint: fingerprint,
            file_name: request.file_name.clone(),
            file_size: request.data.len() as i64,
            mime_type,
            storage_key: stored.key.clone(),
            file_url: stored.url,
            folder_id: request.folder_id,
            ocr: OcrState::initial(request.ocr_requested, now),
        };

        let document = match self.store.insert(&new_document).await {
            Ok(document) => document,
            Err(e) => {
                self.discard_blob(&stored.key).await;
                return Err(e);
            }
        };

        let mut warnings = Vec::new();
        if !request.tag_ids.is_empty() {
            if let Err(e) = self.store.link_tags(document.id, &request.tag_ids).await {
                warn!("Failed to tag document {}: {}", document.id, e);
                self.log_sink.warn(
                    "ingestion",
                    Some(document.id),
                    "Tag linking failed",
                    json!({ "tag_ids": request.tag_ids, "error": e.to_string() }),
                );
                warnings.push("Tags could not be applied".to_string());
            }
        }

        if request.ocr_requested {
            self.dispatcher.dispatch(document.id);
        }

        info!(
            "Document {} created for {} ({} bytes, ocr: {})",
            document.id, document.owner_id, document.file_size, request.ocr_requested
        );

        let message = if request.ocr_requested {
            "Document uploaded, text extraction queued"
        } else {
            "Document uploaded"
        };

        Ok(IngestionOutcome::Created {
            document,
            warnings,
            message: message.to_string(),
        })
    }

    /// Compensating delete for a blob whose record could not be created
    async fn discard_blob(&self, key: &str) {
        if let Err(e) = self.storage.delete(key).await {
            error!("Orphaned blob '{}' left in storage: {}", key, e);
            self.log_sink.error(
                "ingestion",
                None,
                "Orphaned blob after failed record creation",
                json!({ "storage_key": key, "error": e.to_string() }),
            );
        }
    }
}
