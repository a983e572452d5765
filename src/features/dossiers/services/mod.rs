mod dossier_link_service;
mod timeline_service;

pub use dossier_link_service::DossierLinkService;
pub use timeline_service::TimelineService;
