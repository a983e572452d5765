mod ocr_handler;
mod worker_handler;

pub use ocr_handler::*;
pub use worker_handler::*;
