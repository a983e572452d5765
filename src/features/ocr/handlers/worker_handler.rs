use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::core::extractor::ApiJson;
use crate::features::ocr::dtos::{CompleteOcrDto, FailOcrDto, OcrJobResponseDto};
use crate::features::ocr::services::OcrJobService;
use crate::shared::types::ApiResponse;

/// Worker claims a queued job
#[utoipa::path(
    post,
    path = "/api/internal/ocr/{id}/begin",
    tag = "ocr-worker",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Job is processing", body = ApiResponse<OcrJobResponseDto>),
        (status = 401, description = "Invalid worker credential"),
        (status = 409, description = "Job is not queued or OCR is disabled")
    ),
    security(("worker_auth" = []))
)]
pub async fn begin_ocr(
    State(service): State<Arc<OcrJobService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OcrJobResponseDto>>> {
    let document = service.begin(id).await?;
    Ok(Json(ApiResponse::success(Some(document.into()), None, None)))
}

/// Worker reports extracted text
#[utoipa::path(
    post,
    path = "/api/internal/ocr/{id}/complete",
    tag = "ocr-worker",
    params(("id" = Uuid, Path, description = "Document ID")),
    request_body = CompleteOcrDto,
    responses(
        (status = 200, description = "Job completed", body = ApiResponse<OcrJobResponseDto>),
        (status = 401, description = "Invalid worker credential"),
        (status = 409, description = "Job is not processing")
    ),
    security(("worker_auth" = []))
)]
pub async fn complete_ocr(
    State(service): State<Arc<OcrJobService>>,
    Path(id): Path<Uuid>,
    ApiJson(dto): ApiJson<CompleteOcrDto>,
) -> Result<Json<ApiResponse<OcrJobResponseDto>>> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let document = service.complete(id, dto.text).await?;
    Ok(Json(ApiResponse::success(Some(document.into()), None, None)))
}

/// Worker reports a failed extraction
#[utoipa::path(
    post,
    path = "/api/internal/ocr/{id}/fail",
    tag = "ocr-worker",
    params(("id" = Uuid, Path, description = "Document ID")),
    request_body = FailOcrDto,
    responses(
        (status = 200, description = "Job failed", body = ApiResponse<OcrJobResponseDto>),
        (status = 400, description = "Missing reason"),
        (status = 401, description = "Invalid worker credential"),
        (status = 409, description = "Job is not processing")
    ),
    security(("worker_auth" = []))
)]
pub async fn fail_ocr(
    State(service): State<Arc<OcrJobService>>,
    Path(id): Path<Uuid>,
    ApiJson(dto): ApiJson<FailOcrDto>,
) -> Result<Json<ApiResponse<OcrJobResponseDto>>> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let document = service.fail(id, dto.reason.trim().to_string()).await?;
    Ok(Json(ApiResponse::success(Some(document.into()), None, None)))
}
