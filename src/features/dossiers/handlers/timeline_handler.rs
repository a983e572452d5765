use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::core::extractor::ApiJson;
use crate::features::auth::model::AuthenticatedUser;
use crate::features::dossiers::dtos::{AddNoteDto, DossierStateResponseDto, UpdateDossierStateDto};
use crate::features::dossiers::models::{DossierEvent, DossierStateUpdate};
use crate::features::dossiers::services::TimelineService;
use crate::shared::types::{ApiResponse, Meta, PaginationQuery};

/// Dossier timeline, newest first
#[utoipa::path(
    get,
    path = "/api/dossiers/{id}/timeline",
    tag = "dossiers",
    params(
        ("id" = Uuid, Path, description = "Dossier ID"),
        PaginationQuery
    ),
    responses(
        (status = 200, description = "Events with total count in meta", body = ApiResponse<Vec<DossierEvent>>),
        (status = 403, description = "Not your dossier"),
        (status = 404, description = "Dossier not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_timeline(
    user: AuthenticatedUser,
    State(service): State<Arc<TimelineService>>,
    Path(dossier_id): Path<Uuid>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<ApiResponse<Vec<DossierEvent>>>> {
    let (events, total) = service.timeline(dossier_id, &user, &pagination).await?;

    Ok(Json(ApiResponse::success(
        Some(events),
        None,
        Some(Meta { total }),
    )))
}

/// Add a note to a dossier timeline
#[utoipa::path(
    post,
    path = "/api/dossiers/{id}/notes",
    tag = "dossiers",
    params(("id" = Uuid, Path, description = "Dossier ID")),
    request_body = AddNoteDto,
    responses(
        (status = 201, description = "Note added", body = ApiResponse<DossierEvent>),
        (status = 400, description = "Empty note"),
        (status = 404, description = "Dossier not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn add_note(
    user: AuthenticatedUser,
    State(service): State<Arc<TimelineService>>,
    Path(dossier_id): Path<Uuid>,
    ApiJson(dto): ApiJson<AddNoteDto>,
) -> Result<(StatusCode, Json<ApiResponse<DossierEvent>>)> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let event = service.add_note(dossier_id, &dto.text, &user).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(Some(event), None, None)),
    ))
}

/// Update dossier status, phase or admin state
///
/// Appends one timeline event per field that changed.
#[utoipa::path(
    patch,
    path = "/api/dossiers/{id}/state",
    tag = "dossiers",
    params(("id" = Uuid, Path, description = "Dossier ID")),
    request_body = UpdateDossierStateDto,
    responses(
        (status = 200, description = "Dossier updated", body = ApiResponse<DossierStateResponseDto>),
        (status = 400, description = "Nothing to update"),
        (status = 404, description = "Dossier not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_state(
    user: AuthenticatedUser,
    State(service): State<Arc<TimelineService>>,
    Path(dossier_id): Path<Uuid>,
    ApiJson(dto): ApiJson<UpdateDossierStateDto>,
) -> Result<Json<ApiResponse<DossierStateResponseDto>>> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let update = DossierStateUpdate::from(dto);
    let (dossier, events) = service.update_state(dossier_id, &update, &user).await?;

    Ok(Json(ApiResponse::success(
        Some(DossierStateResponseDto { dossier, events }),
        None,
        None,
    )))
}
