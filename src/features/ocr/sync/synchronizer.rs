use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use super::dedup_fetcher::DedupFetcher;
use super::status_cache::StatusCache;
use super::status_source::{OcrStatusSource, SyncError};
use crate::core::config::SyncConfig;
use crate::features::ocr::models::OcrSnapshot;

/// Keeps subscribers' view of OCR jobs fresh by polling in-flight jobs
pub struct StatusSynchronizer {
    fetcher: DedupFetcher,
    cache: Arc<StatusCache>,
    poll_interval: Duration,
}

impl StatusSynchronizer {
    pub fn new(
        source: Arc<dyn OcrStatusSource>,
        cache: Arc<StatusCache>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            fetcher: DedupFetcher::new(source, config.dedup_window),
            cache,
            poll_interval: config.poll_interval,
        }
    }

    pub fn cache(&self) -> &Arc<StatusCache> {
        &self.cache
    }

    /// Revalidate one document, bypassing the dedup window
    pub async fn refresh(&self, document_id: Uuid) -> Result<OcrSnapshot, SyncError> {
        let snapshot = self.fetcher.fetch(document_id, true).await?;
        Ok(self.cache.apply_polled(snapshot))
    }

    async fn poll(&self, document_id: Uuid) -> Result<OcrSnapshot, SyncError> {
        let snapshot = self.fetcher.fetch(document_id, false).await?;
        Ok(self.cache.apply_polled(snapshot))
    }

    pub fn open_view(self: &Arc<Self>) -> SyncView {
        SyncView {
            sync: self.clone(),
            token: CancellationToken::new(),
            pollers: Arc::new(Mutex::new(HashMap::new())),
            watched: HashSet::new(),
            last_seen: HashMap::new(),
            updates: self.cache.subscribe(),
        }
    }
}

/// One subscriber's window onto the synchronizer.
///
/// Owns its pollers: at most one per job, all cancelled when the view is
/// disposed or dropped.
pub struct SyncView {
    sync: Arc<StatusSynchronizer>,
    token: CancellationToken,
    pollers: Arc<Mutex<HashMap<Uuid, CancellationToken>>>,
    watched: HashSet<Uuid>,
    /// Last snapshot handed out per document, so repeats are not re-delivered
    last_seen: HashMap<Uuid, OcrSnapshot>,
    updates: broadcast::Receiver<OcrSnapshot>,
}

impl SyncView {
    /// Start watching documents and return their current snapshots
    pub async fn watch(&mut self, document_ids: &[Uuid]) -> Result<Vec<OcrSnapshot>, SyncError> {
        let mut snapshots = Vec::with_capacity(document_ids.len());

        for &id in document_ids {
            let snapshot = self.sync.poll(id).await?;
            if self.watched.insert(id) {
                self.sync.cache.add_watcher(id);
            }
            self.last_seen.insert(id, snapshot.clone());
            self.track(&snapshot);
            snapshots.push(snapshot);
        }

        Ok(snapshots)
    }

    /// Ensure a poller runs for `snapshot`'s job if it is still in flight
    pub fn track(&self, snapshot: &OcrSnapshot) {
        if self.token.is_cancelled() || !snapshot.status.is_in_flight() {
            return;
        }

        let id = snapshot.document_id;
        let child = {
            let mut pollers = lock_pollers(&self.pollers);
            if pollers.contains_key(&id) {
                return;
            }
            let child = self.token.child_token();
            pollers.insert(id, child.clone());
            child
        };

        debug!("Polling OCR status for document {}", id);
        tokio::spawn(run_poller(
            self.sync.clone(),
            self.pollers.clone(),
            id,
            child,
        ));
    }

    /// Next visible change for a watched document, or `None` once disposed
    pub async fn next_update(&mut self) -> Option<OcrSnapshot> {
        loop {
            let received = tokio::select! {
                _ = self.token.cancelled() => return None,
                received = self.updates.recv() => received,
            };

            match received {
                Ok(snapshot) if self.watched.contains(&snapshot.document_id) => {
                    if self.last_seen.get(&snapshot.document_id) == Some(&snapshot) {
                        continue;
                    }
                    // A retry can put a settled job back in flight
                    self.track(&snapshot);
                    self.last_seen.insert(snapshot.document_id, snapshot.clone());
                    return Some(snapshot);
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("OCR status view lagged, skipped {} updates", skipped);
                    continue;
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    pub fn is_polling(&self, document_id: Uuid) -> bool {
        self.pollers
            .lock()
            .map(|pollers| pollers.contains_key(&document_id))
            .unwrap_or(false)
    }

    pub fn active_pollers(&self) -> usize {
        self.pollers.lock().map(|pollers| pollers.len()).unwrap_or(0)
    }

    pub fn dispose(&self) {
        self.token.cancel();
    }
}

impl Drop for SyncView {
    fn drop(&mut self) {
        self.token.cancel();
        for id in self.watched.drain() {
            self.sync.cache.remove_watcher(id);
        }
    }
}

fn lock_pollers(
    pollers: &Mutex<HashMap<Uuid, CancellationToken>>,
) -> MutexGuard<'_, HashMap<Uuid, CancellationToken>> {
    pollers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn run_poller(
    sync: Arc<StatusSynchronizer>,
    pollers: Arc<Mutex<HashMap<Uuid, CancellationToken>>>,
    document_id: Uuid,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(sync.poll_interval) => {}
        }

        match sync.fetcher.fetch(document_id, false).await {
            Ok(snapshot) => {
                // Settled entries leave under the same lock that publishes them
                let mut active = lock_pollers(&pollers);
                let visible = sync.cache.apply_polled(snapshot);
                if !visible.status.is_in_flight() {
                    active.remove(&document_id);
                    debug!(
                        "OCR job for document {} settled as {}",
                        document_id, visible.status
                    );
                    return;
                }
            }
            Err(SyncError::NotFound(_)) => break,
            Err(e) => warn!("OCR status poll failed for {}: {}", document_id, e),
        }
    }

    lock_pollers(&pollers).remove(&document_id);
}
