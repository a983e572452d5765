use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use utoipa::ToSchema;

/// OCR job status as stored in `documents.ocr_status`
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, sqlx::Type,
)]
#[sqlx(type_name = "ocr_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OcrStatus {
    /// OCR never requested
    None,
    Queued,
    Processing,
    Completed,
    Failed,
    /// OCR was disabled after a failure
    Pending,
    /// Legacy value written by older clients. Treated exactly like `Queued`.
    Paused,
}

impl OcrStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OcrStatus::None => "none",
            OcrStatus::Queued => "queued",
            OcrStatus::Processing => "processing",
            OcrStatus::Completed => "completed",
            OcrStatus::Failed => "failed",
            OcrStatus::Pending => "pending",
            OcrStatus::Paused => "paused",
        }
    }

    /// Statuses a poller keeps watching; everything else is settled
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            OcrStatus::Queued | OcrStatus::Processing | OcrStatus::Paused
        )
    }

    fn is_waiting(&self) -> bool {
        matches!(self, OcrStatus::Queued | OcrStatus::Paused)
    }
}

impl fmt::Display for OcrStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something that asks an OCR job to move
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OcrEvent {
    Enable,
    Disable,
    Begin,
    Succeed { text: String },
    Fail { reason: String },
    Retry,
    Requeue,
}

impl OcrEvent {
    pub fn name(&self) -> &'static str {
        match self {
            OcrEvent::Enable => "enable",
            OcrEvent::Disable => "disable",
            OcrEvent::Begin => "begin",
            OcrEvent::Succeed { .. } => "succeed",
            OcrEvent::Fail { .. } => "fail",
            OcrEvent::Retry => "retry",
            OcrEvent::Requeue => "requeue",
        }
    }

    /// Events after which the external worker must be woken up
    pub fn triggers_worker(&self) -> bool {
        matches!(self, OcrEvent::Enable | OcrEvent::Retry | OcrEvent::Requeue)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("cannot {event} an OCR job that is {from}")]
    Invalid { from: OcrStatus, event: &'static str },

    #[error("a failure reason is required")]
    MissingFailureReason,

    #[error("OCR is disabled for this document")]
    Disabled,
}

/// The OCR-related columns of a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrState {
    pub status: OcrStatus,
    pub enabled: bool,
    pub retry_count: i32,
    pub text: Option<String>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl OcrState {
    /// State of a freshly ingested document
    pub fn initial(ocr_requested: bool, now: DateTime<Utc>) -> Self {
        if ocr_requested {
            Self {
                status: OcrStatus::Queued,
                enabled: true,
                retry_count: 0,
                text: None,
                error: None,
                started_at: Some(now),
                completed_at: None,
            }
        } else {
            Self {
                status: OcrStatus::None,
                enabled: false,
                retry_count: 0,
                text: None,
                error: None,
                started_at: None,
                completed_at: None,
            }
        }
    }

    /// Compute the state after `event`. Pure: persistence and worker
    /// triggering are the caller's job.
    pub fn apply(&self, event: &OcrEvent, now: DateTime<Utc>) -> Result<OcrState, TransitionError> {
        let invalid = || TransitionError::Invalid {
            from: self.status,
            event: event.name(),
        };
        let mut next = self.clone();

        match event {
            OcrEvent::Enable => {
                next.status = OcrStatus::Queued;
                next.enabled = true;
                next.error = None;
                next.started_at = Some(now);
            }
            OcrEvent::Disable => {
                next.enabled = false;
                if self.status == OcrStatus::Failed {
                    next.status = OcrStatus::Pending;
                }
            }
            OcrEvent::Begin => {
                if !self.status.is_waiting() {
                    return Err(invalid());
                }
                if !self.enabled {
                    return Err(TransitionError::Disabled);
                }
                next.status = OcrStatus::Processing;
                next.started_at = Some(now);
            }
            OcrEvent::Succeed { text } => {
                if self.status != OcrStatus::Processing {
                    return Err(invalid());
                }
                next.status = OcrStatus::Completed;
                next.text = Some(text.clone());
                next.error = None;
                next.completed_at = Some(now);
            }
            OcrEvent::Fail { reason } => {
                if self.status != OcrStatus::Processing {
                    return Err(invalid());
                }
                let reason = reason.trim();
                if reason.is_empty() {
                    return Err(TransitionError::MissingFailureReason);
                }
                next.status = OcrStatus::Failed;
                next.error = Some(reason.to_string());
            }
            OcrEvent::Retry => {
                if self.status != OcrStatus::Failed {
                    return Err(invalid());
                }
                next.requeue();
            }
            OcrEvent::Requeue => {
                if !self.status.is_waiting() {
                    return Err(invalid());
                }
                next.requeue();
            }
        }

        Ok(next)
    }

    fn requeue(&mut self) {
        self.status = OcrStatus::Queued;
        self.retry_count += 1;
        self.error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn fresh() -> OcrState {
        OcrState::initial(false, Utc::now())
    }

    fn run(state: &OcrState, events: &[OcrEvent]) -> OcrState {
        events.iter().fold(state.clone(), |s, e| {
            s.apply(e, Utc::now()).expect("transition should be valid")
        })
    }

    fn fail(reason: &str) -> OcrEvent {
        OcrEvent::Fail {
            reason: reason.to_string(),
        }
    }

    fn succeed(text: &str) -> OcrEvent {
        OcrEvent::Succeed {
            text: text.to_string(),
        }
    }

    #[test]
    fn test_initial_state_depends_on_request() {
        let requested = OcrState::initial(true, Utc::now());
        assert_eq!(requested.status, OcrStatus::Queued);
        assert!(requested.enabled);
        assert!(requested.started_at.is_some());

        let plain = fresh();
        assert_eq!(plain.status, OcrStatus::None);
        assert!(!plain.enabled);
        assert_eq!(plain.retry_count, 0);
    }

    #[test]
    fn test_happy_path_to_completed() {
        let done = run(&fresh(), &[OcrEvent::Enable, OcrEvent::Begin, succeed("hello")]);
        assert_eq!(done.status, OcrStatus::Completed);
        assert_eq!(done.text.as_deref(), Some("hello"));
        assert!(done.error.is_none());
        assert!(done.completed_at.is_some());
    }

    #[test]
    fn test_every_written_status_is_reachable_from_none() {
        let mut reached = HashSet::new();
        let paths: Vec<Vec<OcrEvent>> = vec![
            vec![],
            vec![OcrEvent::Enable],
            vec![OcrEvent::Enable, OcrEvent::Begin],
            vec![OcrEvent::Enable, OcrEvent::Begin, succeed("t")],
            vec![OcrEvent::Enable, OcrEvent::Begin, fail("boom")],
            vec![
                OcrEvent::Enable,
                OcrEvent::Begin,
                fail("boom"),
                OcrEvent::Disable,
            ],
        ];
        for path in paths {
            reached.insert(run(&fresh(), &path).status);
        }

        for status in [
            OcrStatus::None,
            OcrStatus::Queued,
            OcrStatus::Processing,
            OcrStatus::Completed,
            OcrStatus::Failed,
            OcrStatus::Pending,
        ] {
            assert!(reached.contains(&status), "{status} not reachable");
        }
    }

    #[test]
    fn test_invalid_pairs_are_rejected() {
        let none = fresh();
        assert_eq!(
            none.apply(&OcrEvent::Retry, Utc::now()),
            Err(TransitionError::Invalid {
                from: OcrStatus::None,
                event: "retry"
            })
        );
        assert!(none.apply(&OcrEvent::Begin, Utc::now()).is_err());
        assert!(none.apply(&succeed("x"), Utc::now()).is_err());

        let completed = run(&fresh(), &[OcrEvent::Enable, OcrEvent::Begin, succeed("t")]);
        assert!(completed.apply(&OcrEvent::Retry, Utc::now()).is_err());
        assert!(completed.apply(&OcrEvent::Requeue, Utc::now()).is_err());
        assert!(completed.apply(&fail("late"), Utc::now()).is_err());

        let processing = run(&fresh(), &[OcrEvent::Enable, OcrEvent::Begin]);
        assert!(processing.apply(&OcrEvent::Begin, Utc::now()).is_err());
        assert!(processing.apply(&OcrEvent::Retry, Utc::now()).is_err());
    }

    #[test]
    fn test_fail_requires_reason() {
        let processing = run(&fresh(), &[OcrEvent::Enable, OcrEvent::Begin]);
        assert_eq!(
            processing.apply(&fail("   "), Utc::now()),
            Err(TransitionError::MissingFailureReason)
        );
    }

    #[test]
    fn test_begin_refused_when_disabled() {
        let queued_then_disabled = run(&fresh(), &[OcrEvent::Enable, OcrEvent::Disable]);
        assert_eq!(queued_then_disabled.status, OcrStatus::Queued);
        assert_eq!(
            queued_then_disabled.apply(&OcrEvent::Begin, Utc::now()),
            Err(TransitionError::Disabled)
        );
    }

    #[test]
    fn test_retry_clears_error_and_counts() {
        let failed = run(&fresh(), &[OcrEvent::Enable, OcrEvent::Begin, fail("blurry")]);
        assert_eq!(failed.error.as_deref(), Some("blurry"));

        let retried = failed.apply(&OcrEvent::Retry, Utc::now()).unwrap();
        assert_eq!(retried.status, OcrStatus::Queued);
        assert_eq!(retried.retry_count, 1);
        assert!(retried.error.is_none());
    }

    #[test]
    fn test_paused_behaves_like_queued() {
        let paused = OcrState {
            status: OcrStatus::Paused,
            enabled: true,
            ..fresh()
        };
        assert_eq!(
            paused.apply(&OcrEvent::Begin, Utc::now()).unwrap().status,
            OcrStatus::Processing
        );
        let requeued = paused.apply(&OcrEvent::Requeue, Utc::now()).unwrap();
        assert_eq!(requeued.status, OcrStatus::Queued);
        assert_eq!(requeued.retry_count, 1);
    }

    #[test]
    fn test_retry_count_never_decreases_across_disable_enable() {
        let events = vec![
            OcrEvent::Enable,
            OcrEvent::Begin,
            fail("a"),
            OcrEvent::Retry,
            OcrEvent::Disable,
            OcrEvent::Enable,
            OcrEvent::Requeue,
            OcrEvent::Begin,
            fail("b"),
            OcrEvent::Disable,
            OcrEvent::Enable,
            OcrEvent::Begin,
            fail("c"),
            OcrEvent::Retry,
        ];

        let mut state = fresh();
        let mut previous = state.retry_count;
        for event in &events {
            state = state.apply(event, Utc::now()).unwrap();
            assert!(state.retry_count >= previous);
            if !matches!(event, OcrEvent::Retry | OcrEvent::Requeue) {
                assert_eq!(state.retry_count, previous);
            }
            previous = state.retry_count;
        }
        assert_eq!(state.retry_count, 3);
    }

    #[test]
    fn test_disable_preserves_text_and_marks_failed_as_pending() {
        let completed = run(&fresh(), &[OcrEvent::Enable, OcrEvent::Begin, succeed("kept")]);
        let disabled = completed.apply(&OcrEvent::Disable, Utc::now()).unwrap();
        assert_eq!(disabled.status, OcrStatus::Completed);
        assert_eq!(disabled.text.as_deref(), Some("kept"));
        assert!(!disabled.enabled);

        let failed = run(&fresh(), &[OcrEvent::Enable, OcrEvent::Begin, fail("x")]);
        let pending = failed.apply(&OcrEvent::Disable, Utc::now()).unwrap();
        assert_eq!(pending.status, OcrStatus::Pending);
        assert_eq!(pending.error.as_deref(), Some("x"));
    }

    #[test]
    fn test_only_enable_retry_requeue_wake_the_worker() {
        assert!(OcrEvent::Enable.triggers_worker());
        assert!(OcrEvent::Retry.triggers_worker());
        assert!(OcrEvent::Requeue.triggers_worker());
        assert!(!OcrEvent::Disable.triggers_worker());
        assert!(!OcrEvent::Begin.triggers_worker());
        assert!(!fail("x").triggers_worker());
    }
}
