mod ocr_trigger_client;

pub use ocr_trigger_client::{OcrTrigger, OcrTriggerClient};
