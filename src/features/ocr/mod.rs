pub mod clients;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod sync;
pub mod workers;

pub use clients::OcrTriggerClient;
pub use routes::{routes, worker_routes};
pub use services::{OcrJobService, TriggerDispatcher};
pub use sync::{StatusCache, StatusSynchronizer, StoreStatusSource};
pub use workers::TriggerSweeper;
