use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::core::error::AppError;
use crate::features::auth::model::AuthenticatedUser;
use crate::features::documents::dtos::{
    DeleteDocumentResponseDto, DocumentResponseDto, UploadDocumentDto, UploadResponseDto,
};
use crate::features::documents::models::UploadRejection;
use crate::features::documents::services::{
    DocumentService, DuplicateDecision, IngestionService, UploadRequest,
};
use crate::shared::constants::MAX_UPLOAD_SIZE;
use crate::shared::types::ApiResponse;

/// Upload a document
///
/// Validates the file, checks for an identical upload by the same user, stores
/// the blob and creates the document. With `ocr_enabled` the OCR job is queued.
/// A duplicate is reported as a successful `duplicate_found` outcome and nothing
/// is written unless `duplicate_decision=continue`.
#[utoipa::path(
    post,
    path = "/api/documents/upload",
    tag = "documents",
    request_body(
        content = UploadDocumentDto,
        content_type = "multipart/form-data",
    ),
    responses(
        (status = 201, description = "Document created", body = ApiResponse<UploadResponseDto>),
        (status = 200, description = "Duplicate found or upload cancelled", body = ApiResponse<UploadResponseDto>),
        (status = 400, description = "Invalid file or form field"),
        (status = 401, description = "Authentication required"),
        (status = 413, description = "File too large")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn upload_document(
    user: AuthenticatedUser,
    State(service): State<Arc<IngestionService>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<UploadResponseDto>>), AppError> {
    let mut file: Option<(String, String, axum::body::Bytes)> = None;
    let mut title: Option<String> = None;
    let mut ocr_requested = false;
    let mut tag_ids = Vec::new();
    let mut folder_id = None;
    let mut duplicate_decision = DuplicateDecision::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, "multipart data"))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        if field_name == "file" {
            let mime_type = field
                .content_type()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "application/octet-stream".to_string());
            let file_name = field
                .file_name()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "unnamed".to_string());
            let data = field
                .bytes()
                .await
                .map_err(|e| multipart_error(e, "file data"))?;
            file = Some((file_name, mime_type, data));
            continue;
        }

        let text = field.text().await.map_err(|e| {
            AppError::BadRequest(format!("Failed to read field '{}': {}", field_name, e))
        })?;

        match field_name.as_str() {
            "title" => title = Some(text),
            "ocr_enabled" => ocr_requested = parse_flag(&text),
            "tag_ids" => tag_ids = parse_tag_ids(&text)?,
            "folder_id" if !text.trim().is_empty() => {
                folder_id = Some(parse_uuid("folder_id", &text)?);
            }
            "duplicate_decision" => duplicate_decision = text.parse()?,
            _ => debug!("Ignoring field: {}", field_name),
        }
    }

    let (file_name, mime_type, data) =
        file.ok_or_else(|| AppError::BadRequest("File is required".to_string()))?;

    let outcome = service
        .ingest(UploadRequest {
            owner_id: user.sub.clone(),
            title,
            file_name,
            mime_type,
            data,
            ocr_requested,
            tag_ids,
            folder_id,
            duplicate_decision,
        })
        .await?;

    let (body, message) = UploadResponseDto::from_outcome(outcome);
    let status = if body.is_created() {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(ApiResponse::success(Some(body), Some(message), None)),
    ))
}

/// Get a document
#[utoipa::path(
    get,
    path = "/api/documents/{id}",
    tag = "documents",
    params(
        ("id" = Uuid, Path, description = "Document ID")
    ),
    responses(
        (status = 200, description = "Document", body = ApiResponse<DocumentResponseDto>),
        (status = 403, description = "Not your document"),
        (status = 404, description = "Document not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_document(
    user: AuthenticatedUser,
    State(service): State<Arc<DocumentService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<DocumentResponseDto>>, AppError> {
    let document = service.get(id, &user).await?;

    Ok(Json(ApiResponse::success(
        Some(document.into()),
        None,
        None,
    )))
}

/// Delete a document
///
/// Soft delete; the document disappears from every listing and duplicate check.
#[utoipa::path(
    delete,
    path = "/api/documents/{id}",
    tag = "documents",
    params(
        ("id" = Uuid, Path, description = "Document ID")
    ),
    responses(
        (status = 200, description = "Document deleted", body = ApiResponse<DeleteDocumentResponseDto>),
        (status = 403, description = "Not your document"),
        (status = 404, description = "Document not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_document(
    user: AuthenticatedUser,
    State(service): State<Arc<DocumentService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<DeleteDocumentResponseDto>>, AppError> {
    service.delete(id, &user).await?;

    Ok(Json(ApiResponse::success(
        Some(DeleteDocumentResponseDto { deleted: true }),
        Some("Document deleted".to_string()),
        None,
    )))
}

/// A body cut off by the upload limit is reported as an oversized file
fn multipart_error(e: MultipartError, reading: &str) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return UploadRejection::FileTooLarge {
            max: MAX_UPLOAD_SIZE,
        }
        .into();
    }
    debug!("Failed to read {}: {}", reading, e);
    AppError::BadRequest(format!("Failed to read {}: {}", reading, e))
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "on" | "yes"
    )
}

fn parse_uuid(field: &str, value: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(value.trim())
        .map_err(|_| AppError::Validation(format!("Invalid {}: '{}'", field, value.trim())))
}

/// Accepts a JSON array or a comma separated list
fn parse_tag_ids(value: &str) -> Result<Vec<Uuid>, AppError> {
    let value = value.trim();
    if value.starts_with('[') {
        return serde_json::from_str(value)
            .map_err(|e| AppError::Validation(format!("Invalid tag_ids: {}", e)));
    }

    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse_uuid("tag_ids", s))
        .collect()
}
