use std::sync::Arc;

use axum::{
    routing::{delete, get, patch, post},
    Router,
};

use crate::features::dossiers::handlers;
use crate::features::dossiers::services::{DossierLinkService, TimelineService};

/// Create routes for the dossiers feature
///
/// Note: This feature requires authentication
pub fn routes(links: Arc<DossierLinkService>, timeline: Arc<TimelineService>) -> Router {
    let link_routes = Router::new()
        .route(
            "/api/dossiers/available-documents",
            get(handlers::list_available_documents),
        )
        .route("/api/dossiers/{id}/documents", post(handlers::link_document))
        .route(
            "/api/dossiers/links/{link_id}",
            delete(handlers::unlink_document),
        )
        .route("/api/dossiers/{id}/folders", post(handlers::link_folder))
        .route(
            "/api/dossiers/folder-links/{link_id}",
            delete(handlers::unlink_folder),
        )
        .with_state(links);

    let timeline_routes = Router::new()
        .route("/api/dossiers/{id}/timeline", get(handlers::get_timeline))
        .route("/api/dossiers/{id}/notes", post(handlers::add_note))
        .route("/api/dossiers/{id}/state", patch(handlers::update_state))
        .with_state(timeline);

    link_routes.merge(timeline_routes)
}
