pub mod dtos;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod stores;

pub use routes::routes;
pub use services::{DocumentService, IngestionService};
pub use stores::{DocumentStore, PgDocumentStore};
