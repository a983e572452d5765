//! Storage module for document blobs
//!
//! Provides the [`ObjectStorage`] seam and its MinIO/S3-compatible
//! implementation.

mod minio_client;
mod object_storage;

pub use minio_client::MinIOClient;
pub use object_storage::{ObjectStorage, StoredObject};
