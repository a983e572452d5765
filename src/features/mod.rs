pub mod auth;
pub mod documents;
pub mod dossiers;
pub mod ocr;
