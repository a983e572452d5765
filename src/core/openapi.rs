use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::features::auth;
use crate::features::documents::{dtos as documents_dtos, handlers as documents_handlers};
use crate::features::documents::services::DuplicateDecision;
use crate::features::dossiers::{
    dtos as dossiers_dtos, handlers as dossiers_handlers, models as dossiers_models,
};
use crate::features::ocr::{dtos as ocr_dtos, handlers as ocr_handlers, models as ocr_models};
use crate::shared::types::{ApiResponse, Meta};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Documents
        documents_handlers::upload_document,
        documents_handlers::get_document,
        documents_handlers::delete_document,
        // OCR
        ocr_handlers::enable_ocr,
        ocr_handlers::disable_ocr,
        ocr_handlers::retry_ocr,
        ocr_handlers::requeue_ocr,
        ocr_handlers::refresh_ocr,
        ocr_handlers::stream_ocr_status,
        // OCR worker callbacks
        ocr_handlers::begin_ocr,
        ocr_handlers::complete_ocr,
        ocr_handlers::fail_ocr,
        // Dossiers
        dossiers_handlers::list_available_documents,
        dossiers_handlers::link_document,
        dossiers_handlers::unlink_document,
        dossiers_handlers::link_folder,
        dossiers_handlers::unlink_folder,
        dossiers_handlers::get_timeline,
        dossiers_handlers::add_note,
        dossiers_handlers::update_state,
    ),
    components(
        schemas(
            // Shared
            Meta,
            auth::model::AuthenticatedUser,
            // Documents
            documents_dtos::UploadDocumentDto,
            documents_dtos::DocumentResponseDto,
            documents_dtos::DuplicateMatchDto,
            documents_dtos::UploadResponseDto,
            documents_dtos::DeleteDocumentResponseDto,
            DuplicateDecision,
            ApiResponse<documents_dtos::UploadResponseDto>,
            ApiResponse<documents_dtos::DocumentResponseDto>,
            ApiResponse<documents_dtos::DeleteDocumentResponseDto>,
            // OCR
            ocr_models::OcrStatus,
            ocr_models::OcrSnapshot,
            ocr_dtos::OcrJobResponseDto,
            ocr_dtos::CompleteOcrDto,
            ocr_dtos::FailOcrDto,
            ApiResponse<ocr_dtos::OcrJobResponseDto>,
            ApiResponse<ocr_models::OcrSnapshot>,
            // Dossiers
            dossiers_models::Dossier,
            dossiers_models::DossierLink,
            dossiers_models::DossierFolderLink,
            dossiers_models::DossierEvent,
            dossiers_models::DossierEventKind,
            dossiers_dtos::LinkDocumentDto,
            dossiers_dtos::LinkFolderDto,
            dossiers_dtos::AddNoteDto,
            dossiers_dtos::UpdateDossierStateDto,
            dossiers_dtos::DossierStateResponseDto,
            dossiers_dtos::AvailableDocumentDto,
            dossiers_dtos::UnlinkResponseDto,
            ApiResponse<dossiers_models::DossierLink>,
            ApiResponse<dossiers_models::DossierFolderLink>,
            ApiResponse<dossiers_models::DossierEvent>,
            ApiResponse<Vec<dossiers_models::DossierEvent>>,
            ApiResponse<dossiers_dtos::DossierStateResponseDto>,
            ApiResponse<Vec<dossiers_dtos::AvailableDocumentDto>>,
            ApiResponse<dossiers_dtos::UnlinkResponseDto>,
        )
    ),
    tags(
        (name = "documents", description = "Document upload with duplicate detection"),
        (name = "ocr", description = "OCR job lifecycle and live status"),
        (name = "ocr-worker", description = "Callbacks for the external OCR worker"),
        (name = "dossiers", description = "Dossier filing and timeline"),
    ),
    modifiers(&SecurityAddon),
    info(
        title = "Dossier Archive API",
        version = "0.1.0",
        description = "API documentation for Dossier Archive",
    )
)]
pub struct ApiDoc;

/// Adds the user JWT and worker credential security schemes
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
            components.add_security_scheme(
                "worker_auth",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

/// Modifier to override OpenAPI info from config
pub struct SwaggerInfoModifier {
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Modify for SwaggerInfoModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info.title = self.title.clone();
        openapi.info.version = self.version.clone();
        openapi.info.description = Some(self.description.clone());
    }
}
