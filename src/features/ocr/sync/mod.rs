//! Server-side OCR status synchronization
//!
//! Subscribers open a [`SyncView`], which polls in-flight jobs through a
//! shared [`DedupFetcher`] and [`StatusCache`].

mod dedup_fetcher;
mod status_cache;
mod status_source;
mod synchronizer;

pub use dedup_fetcher::DedupFetcher;
pub use status_cache::StatusCache;
pub use status_source::{OcrStatusSource, StoreStatusSource, SyncError};
pub use synchronizer::{StatusSynchronizer, SyncView};
