use axum::body::Bytes;
use sha2::{Digest, Sha256};

use crate::core::error::{AppError, Result};

/// Lowercase hex SHA-256 of `data`
pub fn fingerprint_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Hash file contents on the blocking pool so large uploads do not stall the runtime
pub async fn fingerprint(data: Bytes) -> Result<String> {
    tokio::task::spawn_blocking(move || fingerprint_bytes(&data))
        .await
        .map_err(|e| AppError::Internal(format!("Hashing task failed: {}", e)))
}
