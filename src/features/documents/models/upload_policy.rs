use thiserror::Error;

use crate::shared::constants::{MAX_FILE_NAME_LENGTH, MAX_TITLE_LENGTH, MAX_UPLOAD_SIZE};

/// Accepted MIME types and the file extensions each one may carry
const ACCEPTED_TYPES: &[(&str, &[&str])] = &[
    ("application/pdf", &["pdf"]),
    ("image/png", &["png"]),
    ("image/jpeg", &["jpg", "jpeg"]),
    ("image/jpg", &["jpg", "jpeg"]),
];

/// Why an upload was refused before anything was hashed or stored
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadRejection {
    #[error("The file is empty")]
    EmptyFile,

    #[error("File type '{mime_type}' is not supported. Upload a PDF, PNG or JPEG")]
    UnsupportedType { mime_type: String },

    #[error("File name '{file_name}' does not match its type '{mime_type}'")]
    ExtensionMismatch {
        file_name: String,
        mime_type: String,
    },

    #[error("File name must be at most {max} characters")]
    FileNameTooLong { max: usize },

    #[error("File is too large. Maximum size is {max} bytes")]
    FileTooLarge { max: usize },

    #[error("A title is required")]
    MissingTitle,

    #[error("Title must be at most {max} characters")]
    TitleTooLong { max: usize },
}

impl UploadRejection {
    /// Stable machine-readable code for API clients
    pub fn code(&self) -> &'static str {
        match self {
            UploadRejection::EmptyFile => "empty_file",
            UploadRejection::UnsupportedType { .. } => "unsupported_type",
            UploadRejection::ExtensionMismatch { .. } => "extension_mismatch",
            UploadRejection::FileNameTooLong { .. } => "file_name_too_long",
            UploadRejection::FileTooLarge { .. } => "file_too_large",
            UploadRejection::MissingTitle => "missing_title",
            UploadRejection::TitleTooLong { .. } => "title_too_long",
        }
    }
}

/// Lowercased MIME type without parameters (`image/PNG; q=1` -> `image/png`)
pub fn normalize_mime_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Canonical file extension for an accepted MIME type
pub fn extension_for_mime(mime_type: &str) -> Option<&'static str> {
    ACCEPTED_TYPES
        .iter()
        .find(|(mime, _)| *mime == mime_type)
        .and_then(|(_, extensions)| extensions.first().copied())
}

fn file_extension(file_name: &str) -> Option<String> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Check an upload against the accepted formats, size and title rules.
///
/// Checks run in a fixed order (empty, name length, type, extension, size,
/// title) so the caller always gets the first failing rule.
pub fn validate_upload(
    file_name: &str,
    mime_type: &str,
    size: usize,
    title: Option<&str>,
) -> Result<(), UploadRejection> {
    if size == 0 {
        return Err(UploadRejection::EmptyFile);
    }

    if file_name.chars().count() > MAX_FILE_NAME_LENGTH {
        return Err(UploadRejection::FileNameTooLong {
            max: MAX_FILE_NAME_LENGTH,
        });
    }

    let mime_type = normalize_mime_type(mime_type);
    let extensions = ACCEPTED_TYPES
        .iter()
        .find(|(mime, _)| *mime == mime_type)
        .map(|(_, extensions)| *extensions)
        .ok_or_else(|| UploadRejection::UnsupportedType {
            mime_type: mime_type.clone(),
        })?;

    let extension_matches = file_extension(file_name)
        .map(|ext| extensions.contains(&ext.as_str()))
        .unwrap_or(false);
    if !extension_matches {
        return Err(UploadRejection::ExtensionMismatch {
            file_name: file_name.to_string(),
            mime_type,
        });
    }

    if size > MAX_UPLOAD_SIZE {
        return Err(UploadRejection::FileTooLarge {
            max: MAX_UPLOAD_SIZE,
        });
    }

    let title = title.map(str::trim).unwrap_or_default();
    if title.is_empty() {
        return Err(UploadRejection::MissingTitle);
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(UploadRejection::TitleTooLong {
            max: MAX_TITLE_LENGTH,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_supported_formats() {
        assert!(validate_upload("invoice.pdf", "application/pdf", 10, Some("Invoice")).is_ok());
        assert!(validate_upload("scan.PNG", "image/png", 10, Some("Scan")).is_ok());
        assert!(validate_upload("photo.jpeg", "image/jpeg", 10, Some("Photo")).is_ok());
        assert!(validate_upload("photo.jpg", "image/jpg", 10, Some("Photo")).is_ok());
        assert!(validate_upload("a.pdf", "application/pdf; charset=binary", 10, Some("A")).is_ok());
    }

    #[test]
    fn test_empty_file_rejected_first() {
        assert_eq!(
            validate_upload("x.exe", "application/x-msdownload", 0, None),
            Err(UploadRejection::EmptyFile)
        );
    }

    #[test]
    fn test_unsupported_type() {
        let err = validate_upload("notes.txt", "text/plain", 10, Some("Notes")).unwrap_err();
        assert_eq!(err.code(), "unsupported_type");
    }

    #[test]
    fn test_extension_must_match_type() {
        let err = validate_upload("invoice.png", "application/pdf", 10, Some("Invoice")).unwrap_err();
        assert_eq!(err.code(), "extension_mismatch");

        let err = validate_upload("invoice", "application/pdf", 10, Some("Invoice")).unwrap_err();
        assert_eq!(err.code(), "extension_mismatch");
    }

    #[test]
    fn test_size_limit_is_inclusive() {
        assert!(validate_upload("a.pdf", "application/pdf", MAX_UPLOAD_SIZE, Some("A")).is_ok());
        assert_eq!(
            validate_upload("a.pdf", "application/pdf", MAX_UPLOAD_SIZE + 1, Some("A")),
            Err(UploadRejection::FileTooLarge {
                max: MAX_UPLOAD_SIZE
            })
        );
    }

    #[test]
    fn test_file_name_length_is_bounded() {
        let stem = "s".repeat(MAX_FILE_NAME_LENGTH - 4);
        let longest = format!("{}.pdf", stem);
        assert!(validate_upload(&longest, "application/pdf", 1, Some("A")).is_ok());

        let too_long = format!("{}x.pdf", stem);
        assert_eq!(
            validate_upload(&too_long, "application/pdf", 1, Some("A")),
            Err(UploadRejection::FileNameTooLong {
                max: MAX_FILE_NAME_LENGTH
            })
        );

        // Counted in characters, like the column
        let accented = format!("{}.pdf", "é".repeat(MAX_FILE_NAME_LENGTH - 4));
        assert!(validate_upload(&accented, "application/pdf", 1, Some("A")).is_ok());
    }

    #[test]
    fn test_title_required_and_bounded() {
        assert_eq!(
            validate_upload("a.pdf", "application/pdf", 1, Some("   ")),
            Err(UploadRejection::MissingTitle)
        );
        assert_eq!(
            validate_upload("a.pdf", "application/pdf", 1, None),
            Err(UploadRejection::MissingTitle)
        );
        let long = "t".repeat(MAX_TITLE_LENGTH + 1);
        assert_eq!(
            validate_upload("a.pdf", "application/pdf", 1, Some(&long)),
            Err(UploadRejection::TitleTooLong {
                max: MAX_TITLE_LENGTH
            })
        );
    }

    #[test]
    fn test_extension_for_mime() {
        assert_eq!(extension_for_mime("application/pdf"), Some("pdf"));
        assert_eq!(extension_for_mime("image/jpg"), Some("jpg"));
        assert_eq!(extension_for_mime("text/plain"), None);
    }
}
