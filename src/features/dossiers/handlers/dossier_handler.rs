use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::core::error::Result;
use crate::core::extractor::ApiJson;
use crate::features::auth::model::AuthenticatedUser;
use crate::features::dossiers::dtos::{
    AvailableDocumentDto, LinkDocumentDto, LinkFolderDto, UnlinkResponseDto,
};
use crate::features::dossiers::models::{DossierFolderLink, DossierLink};
use crate::features::dossiers::services::DossierLinkService;
use crate::shared::types::{ApiResponse, Meta};

/// File a document into a dossier
///
/// A document belongs to at most one dossier. Moving it requires removing the
/// existing link first; otherwise the request fails with
/// `document_already_linked` naming the current dossier.
#[utoipa::path(
    post,
    path = "/api/dossiers/{id}/documents",
    tag = "dossiers",
    params(("id" = Uuid, Path, description = "Dossier ID")),
    request_body = LinkDocumentDto,
    responses(
        (status = 201, description = "Document linked", body = ApiResponse<DossierLink>),
        (status = 403, description = "Not your dossier or document"),
        (status = 404, description = "Dossier or document not found"),
        (status = 409, description = "Document is already in a dossier")
    ),
    security(("bearer_auth" = []))
)]
pub async fn link_document(
    user: AuthenticatedUser,
    State(service): State<Arc<DossierLinkService>>,
    Path(dossier_id): Path<Uuid>,
    ApiJson(dto): ApiJson<LinkDocumentDto>,
) -> Result<(StatusCode, Json<ApiResponse<DossierLink>>)> {
    let link = service
        .link_document(dossier_id, dto.document_id, &user)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            Some(link),
            Some("Document added to dossier".to_string()),
            None,
        )),
    ))
}

/// Remove a document from its dossier
#[utoipa::path(
    delete,
    path = "/api/dossiers/links/{link_id}",
    tag = "dossiers",
    params(("link_id" = Uuid, Path, description = "Dossier document link ID")),
    responses(
        (status = 200, description = "Link removed", body = ApiResponse<UnlinkResponseDto>),
        (status = 403, description = "Not your dossier"),
        (status = 404, description = "Link not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn unlink_document(
    user: AuthenticatedUser,
    State(service): State<Arc<DossierLinkService>>,
    Path(link_id): Path<Uuid>,
) -> Result<Json<ApiResponse<UnlinkResponseDto>>> {
    service.unlink_document(link_id, &user).await?;

    Ok(Json(ApiResponse::success(
        Some(UnlinkResponseDto { removed: true }),
        Some("Document removed from dossier".to_string()),
        None,
    )))
}

/// Associate a folder with a dossier
#[utoipa::path(
    post,
    path = "/api/dossiers/{id}/folders",
    tag = "dossiers",
    params(("id" = Uuid, Path, description = "Dossier ID")),
    request_body = LinkFolderDto,
    responses(
        (status = 201, description = "Folder linked", body = ApiResponse<DossierFolderLink>),
        (status = 404, description = "Dossier not found"),
        (status = 409, description = "Folder already linked to this dossier")
    ),
    security(("bearer_auth" = []))
)]
pub async fn link_folder(
    user: AuthenticatedUser,
    State(service): State<Arc<DossierLinkService>>,
    Path(dossier_id): Path<Uuid>,
    ApiJson(dto): ApiJson<LinkFolderDto>,
) -> Result<(StatusCode, Json<ApiResponse<DossierFolderLink>>)> {
    let link = service.link_folder(dossier_id, dto.folder_id, &user).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(Some(link), None, None)),
    ))
}

/// Remove a folder association
#[utoipa::path(
    delete,
    path = "/api/dossiers/folder-links/{link_id}",
    tag = "dossiers",
    params(("link_id" = Uuid, Path, description = "Dossier folder link ID")),
    responses(
        (status = 200, description = "Folder link removed", body = ApiResponse<UnlinkResponseDto>),
        (status = 404, description = "Folder link not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn unlink_folder(
    user: AuthenticatedUser,
    State(service): State<Arc<DossierLinkService>>,
    Path(link_id): Path<Uuid>,
) -> Result<Json<ApiResponse<UnlinkResponseDto>>> {
    service.unlink_folder(link_id, &user).await?;

    Ok(Json(ApiResponse::success(
        Some(UnlinkResponseDto { removed: true }),
        None,
        None,
    )))
}

/// List documents not filed in any dossier
///
/// Meant for pickers. Filing can still fail if another request links the
/// document first.
#[utoipa::path(
    get,
    path = "/api/dossiers/available-documents",
    tag = "dossiers",
    responses(
        (status = 200, description = "Unfiled documents, newest first", body = ApiResponse<Vec<AvailableDocumentDto>>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_available_documents(
    user: AuthenticatedUser,
    State(service): State<Arc<DossierLinkService>>,
) -> Result<Json<ApiResponse<Vec<AvailableDocumentDto>>>> {
    let documents: Vec<AvailableDocumentDto> = service
        .available_documents(&user)
        .await?
        .into_iter()
        .map(AvailableDocumentDto::from)
        .collect();
    let total = documents.len() as i64;

    Ok(Json(ApiResponse::success(
        Some(documents),
        None,
        Some(Meta { total }),
    )))
}
