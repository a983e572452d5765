use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::features::ocr::models::{OcrSnapshot, OcrStatus};

const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// How long an entry nobody watches is kept after its last write
pub const UNWATCHED_RETENTION: Duration = Duration::from_secs(60);

struct Cached {
    snapshot: OcrSnapshot,
    stored_at: Instant,
}

impl Cached {
    fn new(snapshot: OcrSnapshot) -> Self {
        Self {
            snapshot,
            stored_at: Instant::now(),
        }
    }
}

#[derive(Default)]
struct CacheState {
    confirmed: HashMap<Uuid, Cached>,
    /// Locally predicted values shown until the server answers
    optimistic: HashMap<Uuid, Cached>,
    watchers: HashMap<Uuid, usize>,
}

impl CacheState {
    fn visible(&self, id: &Uuid) -> Option<&OcrSnapshot> {
        self.optimistic
            .get(id)
            .or_else(|| self.confirmed.get(id))
            .map(|cached| &cached.snapshot)
    }

    fn prune(&mut self, now: Instant, retention: Duration) {
        let watchers = &self.watchers;
        self.confirmed.retain(|id, cached| {
            watchers.contains_key(id) || now.duration_since(cached.stored_at) < retention
        });
        self.optimistic.retain(|id, cached| {
            watchers.contains_key(id) || now.duration_since(cached.stored_at) < retention
        });
    }
}

/// Last known OCR snapshot per document, shared by every open view.
///
/// Changes to the visible value are broadcast to subscribers. Entries for
/// documents no view is watching are dropped once they age past the
/// retention period.
pub struct StatusCache {
    state: Mutex<CacheState>,
    updates: broadcast::Sender<OcrSnapshot>,
    retention: Duration,
}

impl Default for StatusCache {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusCache {
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(CacheState::default()),
            updates,
            retention: UNWATCHED_RETENTION,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OcrSnapshot> {
        self.updates.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // Cache contents are always consistent between statements; recover from poisoning
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        state.prune(Instant::now(), self.retention);
        state
    }

    fn publish(&self, snapshot: OcrSnapshot) {
        // No receivers is fine
        let _ = self.updates.send(snapshot);
    }

    pub fn get(&self, document_id: Uuid) -> Option<OcrSnapshot> {
        self.lock().visible(&document_id).cloned()
    }

    /// Pin a document's entries while a view watches it
    pub fn add_watcher(&self, document_id: Uuid) {
        *self.lock().watchers.entry(document_id).or_insert(0) += 1;
    }

    pub fn remove_watcher(&self, document_id: Uuid) {
        let mut state = self.lock();
        if let Some(count) = state.watchers.get_mut(&document_id) {
            *count -= 1;
            if *count == 0 {
                state.watchers.remove(&document_id);
            }
        }
    }

    /// Record a polled value. An optimistic overlay stays visible until confirmed or rolled back.
    ///
    /// A snapshot older than the confirmed one is a leftover read and is ignored.
    pub fn apply_polled(&self, snapshot: OcrSnapshot) -> OcrSnapshot {
        let (visible, changed) = {
            let mut state = self.lock();
            let id = snapshot.document_id;

            if let Some(current) = state.confirmed.get(&id) {
                if snapshot.updated_at < current.snapshot.updated_at {
                    debug!(
                        "Ignoring stale OCR status {} for document {}",
                        snapshot.status, id
                    );
                    let visible = state.visible(&id).cloned().unwrap_or(snapshot);
                    return visible;
                }
            }

            let previous = state
                .confirmed
                .insert(id, Cached::new(snapshot.clone()))
                .map(|cached| cached.snapshot);
            match state.optimistic.get(&id) {
                Some(overlay) => (overlay.snapshot.clone(), false),
                None => (snapshot.clone(), previous.as_ref() != Some(&snapshot)),
            }
        };

        if changed {
            self.publish(visible.clone());
        }
        visible
    }

    /// Show a failed job as queued right away, before the retry reaches the server
    pub fn begin_optimistic_retry(&self, document_id: Uuid) -> Option<OcrSnapshot> {
        let overlay = {
            let mut state = self.lock();
            let mut overlay = state.visible(&document_id)?.clone();
            overlay.status = OcrStatus::Queued;
            overlay.error = None;
            overlay.retry_count += 1;
            state
                .optimistic
                .insert(document_id, Cached::new(overlay.clone()));
            overlay
        };

        self.publish(overlay.clone());
        Some(overlay)
    }

    /// Apply an authoritative value from a completed mutation, dropping any overlay
    pub fn confirm(&self, snapshot: OcrSnapshot) {
        {
            let mut state = self.lock();
            state.optimistic.remove(&snapshot.document_id);
            state
                .confirmed
                .insert(snapshot.document_id, Cached::new(snapshot.clone()));
        }
        self.publish(snapshot);
    }

    /// Drop the overlay and republish the last confirmed value
    pub fn rollback(&self, document_id: Uuid) {
        let restored = {
            let mut state = self.lock();
            if state.optimistic.remove(&document_id).is_none() {
                return;
            }
            state
                .confirmed
                .get(&document_id)
                .map(|cached| cached.snapshot.clone())
        };

        if let Some(snapshot) = restored {
            self.publish(snapshot);
        }
    }
}
