use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    response::{
        sse::{Event, KeepAlive},
        IntoResponse, Response, Sse,
    },
    Json,
};
use futures::stream::{self, StreamExt};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::core::error::Result;
use crate::features::auth::model::AuthenticatedUser;
use crate::features::documents::models::Document;
use crate::features::documents::services::DocumentService;
use crate::features::ocr::dtos::{OcrJobResponseDto, OcrStreamQuery};
use crate::features::ocr::models::OcrSnapshot;
use crate::features::ocr::services::OcrJobService;
use crate::features::ocr::sync::StatusSynchronizer;
use crate::shared::types::ApiResponse;

/// SSE event name for status snapshots
const STATUS_EVENT: &str = "ocr_status";

/// State for user-facing OCR handlers
#[derive(Clone)]
pub struct OcrHandlerState {
    pub jobs: Arc<OcrJobService>,
    pub sync: Arc<StatusSynchronizer>,
    pub documents: Arc<DocumentService>,
}

fn job_response(document: Document, message: &str) -> Json<ApiResponse<OcrJobResponseDto>> {
    Json(ApiResponse::success(
        Some(document.into()),
        Some(message.to_string()),
        None,
    ))
}

/// Enable OCR for a document
///
/// Queues the job and wakes the OCR worker. Allowed from any status.
#[utoipa::path(
    post,
    path = "/api/documents/{id}/ocr/enable",
    tag = "ocr",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "OCR queued", body = ApiResponse<OcrJobResponseDto>),
        (status = 403, description = "Not your document"),
        (status = 404, description = "Document not found"),
        (status = 409, description = "Job changed concurrently")
    ),
    security(("bearer_auth" = []))
)]
pub async fn enable_ocr(
    user: AuthenticatedUser,
    State(state): State<OcrHandlerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OcrJobResponseDto>>> {
    let document = state.jobs.enable(id, &user).await?;
    Ok(job_response(document, "Text extraction queued"))
}

/// Disable OCR for a document
///
/// Extracted text is kept. A failed job becomes `pending`.
#[utoipa::path(
    post,
    path = "/api/documents/{id}/ocr/disable",
    tag = "ocr",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "OCR disabled", body = ApiResponse<OcrJobResponseDto>),
        (status = 403, description = "Not your document"),
        (status = 404, description = "Document not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn disable_ocr(
    user: AuthenticatedUser,
    State(state): State<OcrHandlerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OcrJobResponseDto>>> {
    let document = state.jobs.disable(id, &user).await?;
    Ok(job_response(document, "Text extraction disabled"))
}

/// Retry a failed OCR job
#[utoipa::path(
    post,
    path = "/api/documents/{id}/ocr/retry",
    tag = "ocr",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "OCR re-queued", body = ApiResponse<OcrJobResponseDto>),
        (status = 404, description = "Document not found"),
        (status = 409, description = "Job is not in a failed state")
    ),
    security(("bearer_auth" = []))
)]
pub async fn retry_ocr(
    user: AuthenticatedUser,
    State(state): State<OcrHandlerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OcrJobResponseDto>>> {
    let document = state.jobs.retry(id, &user).await?;
    Ok(job_response(document, "Text extraction retried"))
}

/// Re-queue a waiting OCR job
///
/// For jobs that sit in the queue without the worker picking them up.
#[utoipa::path(
    post,
    path = "/api/documents/{id}/ocr/requeue",
    tag = "ocr",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "OCR re-queued", body = ApiResponse<OcrJobResponseDto>),
        (status = 404, description = "Document not found"),
        (status = 409, description = "Job is not waiting in the queue")
    ),
    security(("bearer_auth" = []))
)]
pub async fn requeue_ocr(
    user: AuthenticatedUser,
    State(state): State<OcrHandlerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OcrJobResponseDto>>> {
    let document = state.jobs.requeue(id, &user).await?;
    Ok(job_response(document, "Text extraction re-queued"))
}

/// Force a fresh status read for a document
#[utoipa::path(
    post,
    path = "/api/documents/{id}/ocr/refresh",
    tag = "ocr",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Current OCR status", body = ApiResponse<OcrSnapshot>),
        (status = 403, description = "Not your document"),
        (status = 404, description = "Document not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn refresh_ocr(
    user: AuthenticatedUser,
    State(state): State<OcrHandlerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OcrSnapshot>>> {
    state.documents.get(id, &user).await?;
    let snapshot = state.sync.refresh(id).await?;

    Ok(Json(ApiResponse::success(Some(snapshot), None, None)))
}

/// Stream OCR status changes
///
/// Sends the current snapshot of every requested document, then one
/// `ocr_status` event per change until the client disconnects. Jobs are only
/// polled while queued or processing.
#[utoipa::path(
    get,
    path = "/api/documents/ocr/stream",
    tag = "ocr",
    params(OcrStreamQuery),
    responses(
        (status = 200, description = "SSE stream of ocr_status events", content_type = "text/event-stream"),
        (status = 400, description = "Invalid ids"),
        (status = 403, description = "Not your document"),
        (status = 404, description = "Document not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn stream_ocr_status(
    user: AuthenticatedUser,
    State(state): State<OcrHandlerState>,
    Query(query): Query<OcrStreamQuery>,
) -> Result<Response> {
    let ids = query.document_ids()?;
    for &id in &ids {
        state.documents.get(id, &user).await?;
    }

    let mut view = state.sync.open_view();
    let initial = view.watch(&ids).await?;
    debug!(
        "OCR status stream opened by {} for {} documents",
        user.sub,
        ids.len()
    );

    // The view moves into the stream and is dropped with it, which stops its pollers
    let updates = stream::unfold(view, |mut view| async move {
        view.next_update().await.map(|snapshot| (snapshot, view))
    });

    let events = stream::iter(initial)
        .chain(updates)
        .map(|snapshot| Ok::<_, Infallible>(status_event(&snapshot)));

    let sse = Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    );

    Ok(sse.into_response())
}

fn status_event(snapshot: &OcrSnapshot) -> Event {
    Event::default()
        .event(STATUS_EVENT)
        .json_data(snapshot)
        .unwrap_or_else(|e| {
            warn!(
                "Failed to encode OCR status for {}: {}",
                snapshot.document_id, e
            );
            Event::default().event(STATUS_EVENT).comment("encoding failed")
        })
}
