mod ocr_job_service;
mod trigger_dispatcher;

pub use ocr_job_service::{OcrActor, OcrJobService};
pub use trigger_dispatcher::TriggerDispatcher;
