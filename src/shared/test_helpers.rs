use async_trait::async_trait;
use axum::{extract::Request, middleware::Next, response::Response, Router};
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Barrier;
use uuid::Uuid;

use crate::core::config::LogSinkConfig;
use crate::core::error::{AppError, Result};
use crate::features::auth::model::AuthenticatedUser;
use crate::features::documents::models::{Document, NewDocument};
use crate::features::documents::services::content_hasher::fingerprint_bytes;
use crate::features::documents::stores::DocumentStore;
use crate::features::dossiers::models::{
    Dossier, DossierEvent, DossierEventKind, DossierFolderLink, DossierLink, DossierStateUpdate,
    NewDossierEvent, NewDossierFolderLink, NewDossierLink,
};
use crate::features::dossiers::stores::{DossierStore, LinkInsert};
use crate::features::ocr::clients::OcrTrigger;
use crate::features::ocr::models::{OcrSnapshot, OcrState, OcrStatus};
use crate::features::ocr::sync::{OcrStatusSource, SyncError};
use crate::modules::log_sink::{LogEntry, LogSink, LogStore};
use crate::modules::storage::{ObjectStorage, StoredObject};

pub fn create_test_user(sub: &str) -> AuthenticatedUser {
    AuthenticatedUser {
        sub: sub.to_string(),
        email: Some(format!("{}@example.test", sub)),
        roles: vec![],
    }
}

pub fn with_test_user(router: Router, user: AuthenticatedUser) -> Router {
    router.layer(axum::middleware::from_fn(
        move |mut request: Request, next: Next| {
            let user = user.clone();
            async move {
                request.extensions_mut().insert(user);
                next.run(request).await
            }
        },
    ))
}

/// A document with unique content so fingerprints never collide by accident
pub fn sample_new_document(owner: &str) -> NewDocument {
    let marker = Uuid::new_v4();
    NewDocument {
        owner_id: owner.to_string(),
        title: format!("Scan {}", marker),
        content_fingerprint: fingerprint_bytes(marker.as_bytes()),
        file_name: "scan.pdf".to_string(),
        file_size: 16,
        mime_type: "application/pdf".to_string(),
        storage_key: format!("{}/{}.pdf", owner, marker),
        file_url: format!("http://storage.test/documents/{}/{}.pdf", owner, marker),
        folder_id: None,
        ocr: OcrState::initial(false, Utc::now()),
    }
}

/// Sink backed by a [`MemoryLogStore`]; the flusher task lives for the test runtime
pub fn test_log_sink() -> LogSink {
    let (sink, _handle) = LogSink::start(
        Arc::new(MemoryLogStore::default()),
        &LogSinkConfig {
            capacity: 256,
            batch_size: 64,
            flush_interval: Duration::from_secs(3600),
        },
    );
    sink
}

#[derive(Default)]
pub struct MemoryLogStore {
    batches: Mutex<Vec<Vec<LogEntry>>>,
}

impl MemoryLogStore {
    pub fn messages(&self) -> Vec<String> {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .map(|e| e.message.clone())
            .collect()
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }
}

#[async_trait]
impl LogStore for MemoryLogStore {
    async fn write_batch(&self, entries: &[LogEntry]) -> Result<()> {
        self.batches.lock().unwrap().push(entries.to_vec());
        Ok(())
    }
}

#[derive(Default)]
struct DocumentState {
    documents: Vec<Document>,
    fail_inserts: bool,
    fail_lookups: bool,
    fail_tags: bool,
    fail_next_cas: bool,
    tags: Vec<(Uuid, Uuid)>,
}

#[derive(Default)]
pub struct MemoryDocumentStore {
    state: Mutex<DocumentState>,
    read_gate: Mutex<Option<(Arc<Barrier>, usize)>>,
}

impl MemoryDocumentStore {
    /// Rows ever inserted, soft-deleted included
    pub fn count(&self) -> usize {
        self.state.lock().unwrap().documents.len()
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.state.lock().unwrap().fail_inserts = fail;
    }

    pub fn fail_lookups(&self, fail: bool) {
        self.state.lock().unwrap().fail_lookups = fail;
    }

    pub fn fail_tags(&self, fail: bool) {
        self.state.lock().unwrap().fail_tags = fail;
    }

    /// The next compare-and-set behaves as if another writer got there first
    pub fn fail_next_cas(&self) {
        self.state.lock().unwrap().fail_next_cas = true;
    }

    /// The next `readers` calls to `find_by_id` wait for each other, so
    /// that many transitions all load the same row before any of them writes
    pub fn race_next_reads(&self, readers: usize) {
        *self.read_gate.lock().unwrap() = Some((Arc::new(Barrier::new(readers)), readers));
    }

    /// Move a document's timestamps into the past
    pub fn backdate(&self, id: Uuid, by: ChronoDuration) {
        let mut state = self.state.lock().unwrap();
        if let Some(doc) = state.documents.iter_mut().find(|d| d.id == id) {
            doc.created_at -= by;
            doc.updated_at -= by;
        }
    }

    pub fn live_documents(&self) -> Vec<Document> {
        self.state
            .lock()
            .unwrap()
            .documents
            .iter()
            .filter(|d| d.deleted_at.is_none())
            .cloned()
            .collect()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn insert(&self, doc: &NewDocument) -> Result<Document> {
        let mut state = self.state.lock().unwrap();
        if state.fail_inserts {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }

        let now = Utc::now();
        let document = Document {
            id: Uuid::now_v7(),
            owner_id: doc.owner_id.clone(),
            title: doc.title.clone(),
            content_fingerprint: doc.content_fingerprint.clone(),
            file_name: doc.file_name.clone(),
            file_size: doc.file_size,
            mime_type: doc.mime_type.clone(),
            storage_key: doc.storage_key.clone(),
            file_url: doc.file_url.clone(),
            ocr_enabled: doc.ocr.enabled,
            ocr_status: doc.ocr.status,
            ocr_text: doc.ocr.text.clone(),
            ocr_error: doc.ocr.error.clone(),
            ocr_retry_count: doc.ocr.retry_count,
            ocr_started_at: doc.ocr.started_at,
            ocr_completed_at: doc.ocr.completed_at,
            folder_id: doc.folder_id,
            public_link_id: None,
            is_public: false,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        state.documents.push(document.clone());
        Ok(document)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Document>> {
        let barrier = {
            let mut gate = self.read_gate.lock().unwrap();
            let barrier = gate.as_ref().map(|(barrier, _)| barrier.clone());
            let last = match gate.as_mut() {
                Some((_, remaining)) => {
                    *remaining -= 1;
                    *remaining == 0
                }
                None => false,
            };
            if last {
                *gate = None;
            }
            barrier
        };
        if let Some(barrier) = barrier {
            barrier.wait().await;
        }

        let state = self.state.lock().unwrap();
        Ok(state
            .documents
            .iter()
            .find(|d| d.id == id && d.deleted_at.is_none())
            .cloned())
    }

    async fn find_by_fingerprint(
        &self,
        owner_id: &str,
        fingerprint: &str,
    ) -> Result<Option<Document>> {
        let state = self.state.lock().unwrap();
        if state.fail_lookups {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }

        Ok(state
            .documents
            .iter()
            .rev()
            .find(|d| {
                d.owner_id == owner_id
                    && d.content_fingerprint == fingerprint
                    && d.deleted_at.is_none()
            })
            .cloned())
    }

    async fn link_tags(&self, document_id: Uuid, tag_ids: &[Uuid]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_tags {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        state
            .tags
            .extend(tag_ids.iter().map(|tag| (document_id, *tag)));
        Ok(())
    }

    async fn update_ocr(
        &self,
        id: Uuid,
        expected: &OcrState,
        next: &OcrState,
    ) -> Result<Option<Document>> {
        let mut state = self.state.lock().unwrap();
        if std::mem::take(&mut state.fail_next_cas) {
            return Ok(None);
        }

        let Some(doc) = state.documents.iter_mut().find(|d| {
            d.id == id
                && d.deleted_at.is_none()
                && d.ocr_status == expected.status
                && d.ocr_enabled == expected.enabled
                && d.ocr_retry_count == expected.retry_count
        }) else {
            return Ok(None);
        };

        doc.ocr_status = next.status;
        doc.ocr_enabled = next.enabled;
        doc.ocr_retry_count = next.retry_count;
        doc.ocr_text = next.text.clone();
        doc.ocr_error = next.error.clone();
        doc.ocr_started_at = next.started_at;
        doc.ocr_completed_at = next.completed_at;
        doc.updated_at = Utc::now();

        Ok(Some(doc.clone()))
    }

    async fn list_stuck_queued(
        &self,
        older_than: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Document>> {
        let state = self.state.lock().unwrap();
        let mut stuck: Vec<Document> = state
            .documents
            .iter()
            .filter(|d| {
                d.ocr_enabled
                    && matches!(d.ocr_status, OcrStatus::Queued | OcrStatus::Paused)
                    && d.updated_at < older_than
                    && d.deleted_at.is_none()
            })
            .cloned()
            .collect();
        stuck.sort_by_key(|d| d.updated_at);
        stuck.truncate(limit.max(0) as usize);
        Ok(stuck)
    }

    async fn soft_delete(&self, id: Uuid) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        match state
            .documents
            .iter_mut()
            .find(|d| d.id == id && d.deleted_at.is_none())
        {
            Some(doc) => {
                doc.deleted_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct MemoryObjectStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryObjectStorage {
    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn put(&self, path: &str, data: &[u8], _content_type: &str) -> Result<StoredObject> {
        let key = path.to_string();
        self.objects
            .lock()
            .unwrap()
            .insert(key.clone(), data.to_vec());
        Ok(StoredObject {
            url: format!("http://storage.test/{}", key),
            key,
        })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Records every trigger call; optionally fails them all
#[derive(Default)]
pub struct RecordingTrigger {
    calls: Mutex<Vec<Uuid>>,
    fail: bool,
}

impl RecordingTrigger {
    pub fn failing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn calls(&self) -> Vec<Uuid> {
        self.calls.lock().unwrap().clone()
    }

    /// Wait until at least `n` calls arrived, or `timeout` passed
    pub async fn wait_for(&self, n: usize, timeout: Duration) -> Vec<Uuid> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let calls = self.calls();
            if calls.len() >= n || tokio::time::Instant::now() >= deadline {
                return calls;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl OcrTrigger for RecordingTrigger {
    async fn trigger(&self, document_id: Uuid) -> Result<()> {
        self.calls.lock().unwrap().push(document_id);
        if self.fail {
            return Err(AppError::ExternalServiceError(
                "OCR function unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

/// Replays a fixed sequence of statuses per document; the last one repeats
#[derive(Default)]
pub struct ScriptedStatusSource {
    scripts: Mutex<HashMap<Uuid, Vec<OcrStatus>>>,
    calls: Mutex<HashMap<Uuid, usize>>,
    delay: Option<Duration>,
}

impl ScriptedStatusSource {
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn script(&self, document_id: Uuid, statuses: &[OcrStatus]) {
        self.scripts
            .lock()
            .unwrap()
            .insert(document_id, statuses.to_vec());
    }

    pub fn calls(&self, document_id: Uuid) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(&document_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl OcrStatusSource for ScriptedStatusSource {
    async fn fetch(&self, document_id: Uuid) -> std::result::Result<OcrSnapshot, SyncError> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(document_id).or_insert(0);
            *count += 1;
            *count - 1
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let scripts = self.scripts.lock().unwrap();
        let statuses = scripts
            .get(&document_id)
            .filter(|s| !s.is_empty())
            .ok_or(SyncError::NotFound(document_id))?;
        let step = index.min(statuses.len() - 1);
        let status = statuses[step];

        Ok(OcrSnapshot {
            document_id,
            status,
            enabled: status != OcrStatus::None,
            retry_count: 0,
            error: (status == OcrStatus::Failed).then(|| "scripted failure".to_string()),
            has_text: status == OcrStatus::Completed,
            // Fixed per step so a repeated status compares equal
            updated_at: Utc
                .timestamp_opt(1_700_000_000 + step as i64, 0)
                .single()
                .unwrap_or_default(),
        })
    }
}

#[derive(Default)]
struct DossierState {
    dossiers: HashMap<Uuid, Dossier>,
    links: Vec<DossierLink>,
    folder_links: Vec<DossierFolderLink>,
    events: Vec<DossierEvent>,
    skip_next_link_lookup: bool,
}

impl DossierState {
    fn push_event(&mut self, seq: i64, event: &NewDossierEvent) -> DossierEvent {
        let event = DossierEvent {
            id: Uuid::now_v7(),
            seq,
            dossier_id: event.dossier_id,
            kind: event.kind.clone(),
            created_by: event.created_by.clone(),
            created_at: Utc::now(),
        };
        self.events.push(event.clone());
        event
    }
}

/// In-memory dossier store enforcing the same uniqueness rules as the schema
pub struct MemoryDossierStore {
    documents: Arc<MemoryDocumentStore>,
    state: Mutex<DossierState>,
    seq: AtomicUsize,
}

impl MemoryDossierStore {
    pub fn new(documents: Arc<MemoryDocumentStore>) -> Self {
        Self {
            documents,
            state: Mutex::new(DossierState::default()),
            seq: AtomicUsize::new(1),
        }
    }

    fn next_seq(&self) -> i64 {
        self.seq.fetch_add(1, Ordering::SeqCst) as i64
    }

    pub fn add_dossier(&self, owner: &str, title: &str) -> Uuid {
        let now = Utc::now();
        let dossier = Dossier {
            id: Uuid::now_v7(),
            owner_id: owner.to_string(),
            title: title.to_string(),
            status: "open".to_string(),
            phase: "collecting".to_string(),
            admin_state: "active".to_string(),
            created_at: now,
            updated_at: now,
        };
        let id = dossier.id;
        self.state.lock().unwrap().dossiers.insert(id, dossier);
        id
    }

    /// Oldest first
    pub fn events_for(&self, dossier_id: Uuid) -> Vec<DossierEvent> {
        self.state
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|e| e.dossier_id == dossier_id)
            .cloned()
            .collect()
    }

    /// The next `find_link_by_document` misses, like a read racing a concurrent insert
    /// Overwrite an event's timestamp, as a slow concurrent commit would leave it
    pub fn set_event_time(&self, event_id: Uuid, at: DateTime<Utc>) {
        let mut state = self.state.lock().unwrap();
        if let Some(event) = state.events.iter_mut().find(|e| e.id == event_id) {
            event.created_at = at;
        }
    }

    pub fn skip_next_link_lookup(&self) {
        self.state.lock().unwrap().skip_next_link_lookup = true;
    }

    pub fn link_count(&self) -> usize {
        self.state.lock().unwrap().links.len()
    }
}

#[async_trait]
impl DossierStore for MemoryDossierStore {
    async fn find_dossier(&self, id: Uuid) -> Result<Option<Dossier>> {
        Ok(self.state.lock().unwrap().dossiers.get(&id).cloned())
    }

    async fn find_link(&self, link_id: Uuid) -> Result<Option<DossierLink>> {
        let state = self.state.lock().unwrap();
        Ok(state.links.iter().find(|l| l.id == link_id).cloned())
    }

    async fn find_link_by_document(&self, document_id: Uuid) -> Result<Option<DossierLink>> {
        let mut state = self.state.lock().unwrap();
        if std::mem::take(&mut state.skip_next_link_lookup) {
            return Ok(None);
        }
        Ok(state
            .links
            .iter()
            .find(|l| l.document_id == document_id)
            .cloned())
    }

    async fn insert_link(&self, link: &NewDossierLink) -> Result<LinkInsert<DossierLink>> {
        let seq = self.next_seq();
        let mut state = self.state.lock().unwrap();
        if state.links.iter().any(|l| l.document_id == link.document_id) {
            return Ok(LinkInsert::AlreadyLinked);
        }

        let created = DossierLink {
            id: Uuid::now_v7(),
            document_id: link.document_id,
            dossier_id: link.dossier_id,
            created_by: link.created_by.clone(),
            created_at: Utc::now(),
        };
        state.links.push(created.clone());
        let event = state.push_event(
            seq,
            &NewDossierEvent {
                dossier_id: link.dossier_id,
                kind: DossierEventKind::DocumentAdded {
                    document_id: link.document_id,
                },
                created_by: link.created_by.clone(),
            },
        );

        Ok(LinkInsert::Created {
            link: created,
            event,
        })
    }

    async fn delete_link(
        &self,
        link_id: Uuid,
        actor: &str,
    ) -> Result<Option<(DossierLink, DossierEvent)>> {
        let seq = self.next_seq();
        let mut state = self.state.lock().unwrap();
        let Some(position) = state.links.iter().position(|l| l.id == link_id) else {
            return Ok(None);
        };

        let link = state.links.remove(position);
        let event = state.push_event(
            seq,
            &NewDossierEvent {
                dossier_id: link.dossier_id,
                kind: DossierEventKind::DocumentRemoved {
                    document_id: link.document_id,
                },
                created_by: actor.to_string(),
            },
        );
        Ok(Some((link, event)))
    }

    async fn find_folder_link(&self, link_id: Uuid) -> Result<Option<DossierFolderLink>> {
        let state = self.state.lock().unwrap();
        Ok(state.folder_links.iter().find(|l| l.id == link_id).cloned())
    }

    async fn insert_folder_link(
        &self,
        link: &NewDossierFolderLink,
    ) -> Result<LinkInsert<DossierFolderLink>> {
        let seq = self.next_seq();
        let mut state = self.state.lock().unwrap();
        if state
            .folder_links
            .iter()
            .any(|l| l.dossier_id == link.dossier_id && l.folder_id == link.folder_id)
        {
            return Ok(LinkInsert::AlreadyLinked);
        }

        let created = DossierFolderLink {
            id: Uuid::now_v7(),
            dossier_id: link.dossier_id,
            folder_id: link.folder_id,
            created_by: link.created_by.clone(),
            created_at: Utc::now(),
        };
        state.folder_links.push(created.clone());
        let event = state.push_event(
            seq,
            &NewDossierEvent {
                dossier_id: link.dossier_id,
                kind: DossierEventKind::FolderAdded {
                    folder_id: link.folder_id,
                },
                created_by: link.created_by.clone(),
            },
        );

        Ok(LinkInsert::Created {
            link: created,
            event,
        })
    }

    async fn delete_folder_link(
        &self,
        link_id: Uuid,
        actor: &str,
    ) -> Result<Option<(DossierFolderLink, DossierEvent)>> {
        let seq = self.next_seq();
        let mut state = self.state.lock().unwrap();
        let Some(position) = state.folder_links.iter().position(|l| l.id == link_id) else {
            return Ok(None);
        };

        let link = state.folder_links.remove(position);
        let event = state.push_event(
            seq,
            &NewDossierEvent {
                dossier_id: link.dossier_id,
                kind: DossierEventKind::FolderRemoved {
                    folder_id: link.folder_id,
                },
                created_by: actor.to_string(),
            },
        );
        Ok(Some((link, event)))
    }

    async fn update_state(
        &self,
        dossier_id: Uuid,
        update: &DossierStateUpdate,
        actor: &str,
    ) -> Result<Option<(Dossier, Vec<DossierEvent>)>> {
        let mut state = self.state.lock().unwrap();
        let Some(current) = state.dossiers.get(&dossier_id).cloned() else {
            return Ok(None);
        };

        let changes = DossierEventKind::for_state_change(&current, update);
        if changes.is_empty() {
            return Ok(Some((current, Vec::new())));
        }

        let mut updated = current;
        if let Some(status) = &update.status {
            updated.status = status.clone();
        }
        if let Some(phase) = &update.phase {
            updated.phase = phase.clone();
        }
        if let Some(admin_state) = &update.admin_state {
            updated.admin_state = admin_state.clone();
        }
        updated.updated_at = Utc::now();
        state.dossiers.insert(dossier_id, updated.clone());

        let events = changes
            .into_iter()
            .map(|kind| {
                state.push_event(
                    self.next_seq(),
                    &NewDossierEvent {
                        dossier_id,
                        kind,
                        created_by: actor.to_string(),
                    },
                )
            })
            .collect();

        Ok(Some((updated, events)))
    }

    async fn append_event(&self, event: &NewDossierEvent) -> Result<DossierEvent> {
        let seq = self.next_seq();
        Ok(self.state.lock().unwrap().push_event(seq, event))
    }

    async fn list_events(
        &self,
        dossier_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<DossierEvent>, i64)> {
        let mut events = self.events_for(dossier_id);
        let total = events.len() as i64;
        events.sort_by(|a, b| b.seq.cmp(&a.seq));

        let page = events
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn list_unlinked_documents(&self, owner_id: &str) -> Result<Vec<Document>> {
        let linked: Vec<Uuid> = self
            .state
            .lock()
            .unwrap()
            .links
            .iter()
            .map(|l| l.document_id)
            .collect();

        let mut documents: Vec<Document> = self
            .documents
            .live_documents()
            .into_iter()
            .filter(|d| d.owner_id == owner_id && !linked.contains(&d.id))
            .collect();
        documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(documents)
    }
}
