mod document;
mod upload_policy;

pub use document::{Document, NewDocument};
pub use upload_policy::{
    extension_for_mime, normalize_mime_type, validate_upload, UploadRejection,
};
