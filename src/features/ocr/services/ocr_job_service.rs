use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::TriggerDispatcher;
use crate::core::error::{AppError, Result};
use crate::features::auth::model::AuthenticatedUser;
use crate::features::documents::models::Document;
use crate::features::documents::stores::DocumentStore;
use crate::features::ocr::models::{OcrEvent, OcrSnapshot};
use crate::features::ocr::sync::StatusCache;
use crate::modules::log_sink::LogSink;

/// Who is asking for a transition
#[derive(Debug, Clone, Copy)]
pub enum OcrActor<'a> {
    User(&'a AuthenticatedUser),
    /// The external OCR worker, authenticated by its shared credential
    Worker,
}

/// Persists OCR state machine transitions
pub struct OcrJobService {
    store: Arc<dyn DocumentStore>,
    dispatcher: TriggerDispatcher,
    cache: Arc<StatusCache>,
    log_sink: LogSink,
}

impl OcrJobService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        dispatcher: TriggerDispatcher,
        cache: Arc<StatusCache>,
        log_sink: LogSink,
    ) -> Self {
        Self {
            store,
            dispatcher,
            cache,
            log_sink,
        }
    }

    pub async fn enable(&self, id: Uuid, user: &AuthenticatedUser) -> Result<Document> {
        self.transition(id, OcrActor::User(user), OcrEvent::Enable).await
    }

    pub async fn disable(&self, id: Uuid, user: &AuthenticatedUser) -> Result<Document> {
        self.transition(id, OcrActor::User(user), OcrEvent::Disable).await
    }

    pub async fn requeue(&self, id: Uuid, user: &AuthenticatedUser) -> Result<Document> {
        self.transition(id, OcrActor::User(user), OcrEvent::Requeue).await
    }

    /// Retry a failed job. Subscribers see it queued immediately; the
    /// prediction is rolled back if the transition is refused.
    pub async fn retry(&self, id: Uuid, user: &AuthenticatedUser) -> Result<Document> {
        self.cache.begin_optimistic_retry(id);

        let result = self.transition(id, OcrActor::User(user), OcrEvent::Retry).await;
        if result.is_err() {
            self.cache.rollback(id);
        }
        result
    }

    pub async fn begin(&self, id: Uuid) -> Result<Document> {
        self.transition(id, OcrActor::Worker, OcrEvent::Begin).await
    }

    pub async fn complete(&self, id: Uuid, text: String) -> Result<Document> {
        self.transition(id, OcrActor::Worker, OcrEvent::Succeed { text })
            .await
    }

    pub async fn fail(&self, id: Uuid, reason: String) -> Result<Document> {
        let document = self
            .transition(id, OcrActor::Worker, OcrEvent::Fail { reason })
            .await?;

        self.log_sink.warn(
            "ocr_worker",
            Some(id),
            "OCR job failed",
            json!({
                "reason": document.ocr_error,
                "retry_count": document.ocr_retry_count,
            }),
        );
        Ok(document)
    }

    async fn transition(&self, id: Uuid, actor: OcrActor<'_>, event: OcrEvent) -> Result<Document> {
        authorize_event(&actor, &event)?;

        let document = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Document {} not found", id)))?;

        if let OcrActor::User(user) = actor {
            if !user.can_access(&document.owner_id) {
                return Err(AppError::Forbidden(
                    "You do not have permission to change this document".to_string(),
                ));
            }
        }

        let current = document.ocr_state();
        let next = current.apply(&event, Utc::now())?;

        let updated = self
            .store
            .update_ocr(id, &current, &next)
            .await?
            .ok_or_else(|| {
                warn!(
                    "OCR {} for document {} lost a concurrent update",
                    event.name(),
                    id
                );
                AppError::Conflict(
                    "The OCR job changed while processing your request, please reload".to_string(),
                )
            })?;

        info!(
            "OCR {} on document {}: {} -> {} (retries: {})",
            event.name(),
            id,
            document.ocr_status,
            updated.ocr_status,
            updated.ocr_retry_count
        );

        self.cache.confirm(OcrSnapshot::from(&updated));

        if event.triggers_worker() {
            self.dispatcher.dispatch(id);
        }

        Ok(updated)
    }
}

fn authorize_event(actor: &OcrActor<'_>, event: &OcrEvent) -> Result<()> {
    let worker_event = matches!(
        event,
        OcrEvent::Begin | OcrEvent::Succeed { .. } | OcrEvent::Fail { .. }
    );

    match (actor, worker_event) {
        (OcrActor::Worker, true) | (OcrActor::User(_), false) => Ok(()),
        (OcrActor::Worker, false) => Err(AppError::Forbidden(format!(
            "The OCR worker cannot {} a job",
            event.name()
        ))),
        (OcrActor::User(_), true) => Err(AppError::Forbidden(format!(
            "Only the OCR worker can {} a job",
            event.name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ocr::models::{OcrState, OcrStatus, TransitionError};
    use crate::shared::test_helpers::{
        create_test_user, sample_new_document, test_log_sink, MemoryDocumentStore,
        RecordingTrigger,
    };
    use std::time::Duration;

    struct Fixture {
        service: OcrJobService,
        store: Arc<MemoryDocumentStore>,
        trigger: Arc<RecordingTrigger>,
        cache: Arc<StatusCache>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryDocumentStore::default());
        let trigger = Arc::new(RecordingTrigger::default());
        let cache = Arc::new(StatusCache::new());
        let sink = test_log_sink();
        let service = OcrJobService::new(
            store.clone(),
            TriggerDispatcher::new(trigger.clone(), sink.clone()),
            cache.clone(),
            sink,
        );
        Fixture {
            service,
            store,
            trigger,
            cache,
        }
    }

    async fn seed(f: &Fixture, owner: &str, ocr: bool) -> Document {
        let mut doc = sample_new_document(owner);
        doc.ocr = OcrState::initial(ocr, Utc::now());
        f.store.insert(&doc).await.unwrap()
    }

    #[tokio::test]
    async fn test_enable_queues_and_triggers() {
        let f = fixture();
        let user = create_test_user("owner-1");
        let doc = seed(&f, "owner-1", false).await;

        let updated = f.service.enable(doc.id, &user).await.unwrap();
        assert_eq!(updated.ocr_status, OcrStatus::Queued);
        assert!(updated.ocr_enabled);

        let calls = f.trigger.wait_for(1, Duration::from_secs(1)).await;
        assert_eq!(calls, vec![doc.id]);
        assert_eq!(f.cache.get(doc.id).unwrap().status, OcrStatus::Queued);
    }

    #[tokio::test]
    async fn test_blurry_scan_fails_and_retry_is_counted() {
        let f = fixture();
        let user = create_test_user("owner-1");
        let doc = seed(&f, "owner-1", true).await;

        f.service.begin(doc.id).await.unwrap();
        let failed = f
            .service
            .fail(doc.id, "image too blurry".to_string())
            .await
            .unwrap();
        assert_eq!(failed.ocr_status, OcrStatus::Failed);
        assert_eq!(failed.ocr_error.as_deref(), Some("image too blurry"));

        let retried = f.service.retry(doc.id, &user).await.unwrap();
        assert_eq!(retried.ocr_status, OcrStatus::Queued);
        assert_eq!(retried.ocr_retry_count, 1);
        assert!(retried.ocr_error.is_none());

        f.service.begin(doc.id).await.unwrap();
        let done = f
            .service
            .complete(doc.id, "Total due: 120.00".to_string())
            .await
            .unwrap();
        assert_eq!(done.ocr_status, OcrStatus::Completed);
        assert_eq!(done.ocr_text.as_deref(), Some("Total due: 120.00"));
        assert_eq!(done.ocr_retry_count, 1);
    }

    #[tokio::test]
    async fn test_invalid_retry_rolls_back_optimistic_status() {
        let f = fixture();
        let user = create_test_user("owner-1");
        let doc = seed(&f, "owner-1", true).await;
        f.service.begin(doc.id).await.unwrap();
        f.service.complete(doc.id, "text".to_string()).await.unwrap();

        let err = f.service.retry(doc.id, &user).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidTransition(TransitionError::Invalid {
                from: OcrStatus::Completed,
                ..
            })
        ));
        assert_eq!(f.cache.get(doc.id).unwrap().status, OcrStatus::Completed);
    }

    #[tokio::test]
    async fn test_disable_keeps_extracted_text() {
        let f = fixture();
        let user = create_test_user("owner-1");
        let doc = seed(&f, "owner-1", true).await;
        f.service.begin(doc.id).await.unwrap();
        f.service.complete(doc.id, "kept".to_string()).await.unwrap();

        let disabled = f.service.disable(doc.id, &user).await.unwrap();
        assert!(!disabled.ocr_enabled);
        assert_eq!(disabled.ocr_status, OcrStatus::Completed);
        assert_eq!(disabled.ocr_text.as_deref(), Some("kept"));
    }

    #[tokio::test]
    async fn test_other_users_cannot_transition() {
        let f = fixture();
        let doc = seed(&f, "owner-1", false).await;

        let err = f
            .service
            .enable(doc.id, &create_test_user("intruder"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_stale_compare_and_set_is_a_conflict() {
        let f = fixture();
        let user = create_test_user("owner-1");
        let doc = seed(&f, "owner-1", true).await;
        f.store.fail_next_cas();

        let err = f.service.requeue(doc.id, &user).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let reloaded = f.store.find_by_id(doc.id).await.unwrap().unwrap();
        assert_eq!(reloaded.ocr_retry_count, 0);
    }

    #[tokio::test]
    async fn test_racing_requeues_never_lose_a_count() {
        let f = fixture();
        let user = create_test_user("owner-1");
        let doc = seed(&f, "owner-1", true).await;

        f.store.race_next_reads(2);
        let (a, b) = tokio::join!(
            f.service.requeue(doc.id, &user),
            f.service.requeue(doc.id, &user)
        );
        let succeeded = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!(succeeded, 1);
        assert!([a, b]
            .into_iter()
            .any(|r| matches!(r, Err(AppError::Conflict(_)))));

        let reloaded = f.store.find_by_id(doc.id).await.unwrap().unwrap();
        assert_eq!(reloaded.ocr_retry_count, succeeded as i32);
    }

    #[tokio::test]
    async fn test_stale_disable_cannot_undo_a_requeue() {
        let f = fixture();
        let user = create_test_user("owner-1");
        let doc = seed(&f, "owner-1", true).await;

        f.store.race_next_reads(2);
        let (requeued, disabled) = tokio::join!(
            f.service.requeue(doc.id, &user),
            f.service.disable(doc.id, &user)
        );
        assert!(requeued.is_ok() != disabled.is_ok());

        let reloaded = f.store.find_by_id(doc.id).await.unwrap().unwrap();
        match requeued {
            Ok(written) => {
                assert_eq!(reloaded.ocr_retry_count, written.ocr_retry_count);
                assert!(reloaded.ocr_enabled);
            }
            Err(_) => {
                assert_eq!(reloaded.ocr_retry_count, 0);
                assert!(!reloaded.ocr_enabled);
            }
        }
    }

    #[test]
    fn test_actor_event_permissions() {
        let user = create_test_user("u");
        assert!(authorize_event(&OcrActor::Worker, &OcrEvent::Begin).is_ok());
        assert!(authorize_event(&OcrActor::Worker, &OcrEvent::Retry).is_err());
        assert!(authorize_event(&OcrActor::User(&user), &OcrEvent::Begin).is_err());
        assert!(authorize_event(&OcrActor::User(&user), &OcrEvent::Enable).is_ok());
    }
}
