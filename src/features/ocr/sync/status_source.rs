use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::core::error::AppError;
use crate::features::documents::stores::DocumentStore;
use crate::features::ocr::models::OcrSnapshot;

/// Errors are cloned to every caller sharing an in-flight fetch
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("Document {0} not found")]
    NotFound(Uuid),

    #[error("Status fetch failed: {0}")]
    Fetch(String),
}

impl From<SyncError> for AppError {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::NotFound(id) => AppError::NotFound(format!("Document {} not found", id)),
            SyncError::Fetch(msg) => AppError::Internal(msg),
        }
    }
}

/// Where the synchronizer reads authoritative OCR status from
#[async_trait]
pub trait OcrStatusSource: Send + Sync {
    async fn fetch(&self, document_id: Uuid) -> Result<OcrSnapshot, SyncError>;
}

pub struct StoreStatusSource {
    store: Arc<dyn DocumentStore>,
}

impl StoreStatusSource {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl OcrStatusSource for StoreStatusSource {
    async fn fetch(&self, document_id: Uuid) -> Result<OcrSnapshot, SyncError> {
        match self.store.find_by_id(document_id).await {
            Ok(Some(doc)) => Ok(OcrSnapshot::from(&doc)),
            Ok(None) => Err(SyncError::NotFound(document_id)),
            Err(e) => Err(SyncError::Fetch(e.to_string())),
        }
    }
}
