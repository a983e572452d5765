use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::features::ocr::clients::OcrTrigger;
use crate::modules::log_sink::LogSink;

/// Fire-and-forget wrapper around [`OcrTrigger`].
///
/// Failures are logged and never reach the caller. A job whose trigger was
/// lost stays queued until the sweeper re-sends it.
#[derive(Clone)]
pub struct TriggerDispatcher {
    trigger: Arc<dyn OcrTrigger>,
    log_sink: LogSink,
}

impl TriggerDispatcher {
    pub fn new(trigger: Arc<dyn OcrTrigger>, log_sink: LogSink) -> Self {
        Self { trigger, log_sink }
    }

    pub fn dispatch(&self, document_id: Uuid) {
        let this = self.clone();
        tokio::spawn(async move {
            this.send(document_id).await;
        });
    }

    /// Await the trigger call. Used by the sweeper, which already runs in the background.
    pub async fn send(&self, document_id: Uuid) -> bool {
        match self.trigger.trigger(document_id).await {
            Ok(()) => {
                tracing::debug!("OCR worker triggered for document {}", document_id);
                true
            }
            Err(e) => {
                tracing::warn!("OCR trigger failed for document {}: {}", document_id, e);
                self.log_sink.warn(
                    "ocr_trigger",
                    Some(document_id),
                    "OCR worker trigger failed",
                    json!({ "error": e.to_string() }),
                );
                false
            }
        }
    }
}
