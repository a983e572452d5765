/// Default page size for pagination
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Maximum page size allowed
pub const MAX_PAGE_SIZE: i64 = 100;

// =============================================================================
// ROLE CONSTANTS
// =============================================================================

/// Admin role - full access across owners
pub const ROLE_ADMIN: &str = "admin";

/// Operator role - may inspect and re-queue OCR jobs for any owner
pub const ROLE_OPERATOR: &str = "operator";

// =============================================================================
// UPLOAD LIMITS
// =============================================================================

/// Largest accepted upload, in bytes (15 MiB)
pub const MAX_UPLOAD_SIZE: usize = 15 * 1024 * 1024;

/// Longest accepted document title, in characters
pub const MAX_TITLE_LENGTH: usize = 255;

/// Longest accepted original file name, in characters
pub const MAX_FILE_NAME_LENGTH: usize = 255;
