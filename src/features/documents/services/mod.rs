pub mod content_hasher;
mod document_service;
mod duplicate_detector;
mod ingestion_service;

pub use document_service::DocumentService;
pub use ingestion_service::{DuplicateDecision, IngestionOutcome, IngestionService, UploadRequest};
