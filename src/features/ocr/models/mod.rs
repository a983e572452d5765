mod ocr_snapshot;
mod ocr_state;

pub use ocr_snapshot::OcrSnapshot;
pub use ocr_state::{OcrEvent, OcrState, OcrStatus, TransitionError};
