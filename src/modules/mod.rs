//! Modules layer - Infrastructure components for external integrations
//!
//! Contains blob storage and the buffered operational log sink.

pub mod log_sink;
pub mod storage;
