use std::sync::Arc;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};

use crate::core::middleware::{worker_auth_middleware, WorkerCredential};
use crate::features::documents::services::DocumentService;
use crate::features::ocr::handlers::{self, OcrHandlerState};
use crate::features::ocr::services::OcrJobService;
use crate::features::ocr::sync::StatusSynchronizer;

/// Create user-facing OCR routes
///
/// Note: This feature requires authentication
pub fn routes(
    jobs: Arc<OcrJobService>,
    sync: Arc<StatusSynchronizer>,
    documents: Arc<DocumentService>,
) -> Router {
    let state = OcrHandlerState {
        jobs,
        sync,
        documents,
    };

    Router::new()
        .route("/api/documents/ocr/stream", get(handlers::stream_ocr_status))
        .route("/api/documents/{id}/ocr/enable", post(handlers::enable_ocr))
        .route("/api/documents/{id}/ocr/disable", post(handlers::disable_ocr))
        .route("/api/documents/{id}/ocr/retry", post(handlers::retry_ocr))
        .route("/api/documents/{id}/ocr/requeue", post(handlers::requeue_ocr))
        .route("/api/documents/{id}/ocr/refresh", post(handlers::refresh_ocr))
        .with_state(state)
}

/// Routes the external OCR worker calls back on, guarded by its own credential
/// instead of user tokens
pub fn worker_routes(jobs: Arc<OcrJobService>, credential: WorkerCredential) -> Router {
    Router::new()
        .route("/api/internal/ocr/{id}/begin", post(handlers::begin_ocr))
        .route("/api/internal/ocr/{id}/complete", post(handlers::complete_ocr))
        .route("/api/internal/ocr/{id}/fail", post(handlers::fail_ocr))
        .with_state(jobs)
        .layer(from_fn_with_state(credential, worker_auth_middleware))
}
