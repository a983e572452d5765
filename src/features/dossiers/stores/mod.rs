mod dossier_store;

pub use dossier_store::{DossierStore, LinkInsert, PgDossierStore};
