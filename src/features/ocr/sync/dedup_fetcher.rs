use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use super::status_source::{OcrStatusSource, SyncError};
use crate::features::ocr::models::OcrSnapshot;

type SharedFetch = Shared<BoxFuture<'static, Result<OcrSnapshot, SyncError>>>;

struct Entry {
    started: Instant,
    fetch: SharedFetch,
}

/// Single-flight status reads keyed by document id.
///
/// Concurrent callers for the same id share one request, and a settled
/// result is reused until the dedup window has passed. A forced fetch always
/// starts a new request.
pub struct DedupFetcher {
    source: Arc<dyn OcrStatusSource>,
    window: Duration,
    entries: Mutex<HashMap<Uuid, Entry>>,
}

impl DedupFetcher {
    pub fn new(source: Arc<dyn OcrStatusSource>, window: Duration) -> Self {
        Self {
            source,
            window,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn fetch(&self, document_id: Uuid, force: bool) -> Result<OcrSnapshot, SyncError> {
        let fetch = self.shared_fetch(document_id, force)?;
        fetch.await
    }

    fn shared_fetch(&self, document_id: Uuid, force: bool) -> Result<SharedFetch, SyncError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| SyncError::Fetch("fetcher state poisoned".to_string()))?;

        let now = Instant::now();
        let window = self.window;
        entries.retain(|_, entry| {
            entry.fetch.peek().is_none() || now.duration_since(entry.started) < window
        });

        if !force {
            if let Some(entry) = entries.get(&document_id) {
                return Ok(entry.fetch.clone());
            }
        }

        let source = self.source.clone();
        let fetch = async move { source.fetch(document_id).await }
            .boxed()
            .shared();

        entries.insert(
            document_id,
            Entry {
                started: now,
                fetch: fetch.clone(),
            },
        );

        Ok(fetch)
    }
}
