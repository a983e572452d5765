mod dossier_handler;
mod timeline_handler;

pub use dossier_handler::*;
pub use timeline_handler::*;
