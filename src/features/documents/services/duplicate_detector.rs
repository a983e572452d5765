use serde_json::json;
use std::sync::Arc;

use crate::features::documents::models::Document;
use crate::features::documents::stores::DocumentStore;
use crate::modules::log_sink::LogSink;

/// Finds an existing document of the same owner with identical content
#[derive(Clone)]
pub struct DuplicateDetector {
    store: Arc<dyn DocumentStore>,
    log_sink: LogSink,
}

impl DuplicateDetector {
    pub fn new(store: Arc<dyn DocumentStore>, log_sink: LogSink) -> Self {
        Self { store, log_sink }
    }

    /// A lookup failure is logged and treated as "no duplicate" so the upload can proceed
    pub async fn find_duplicate(&self, owner_id: &str, fingerprint: &str) -> Option<Document> {
        match self.store.find_by_fingerprint(owner_id, fingerprint).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(
                    "Duplicate lookup failed for owner {}, continuing without check: {}",
                    owner_id,
                    e
                );
                self.log_sink.warn(
                    "duplicate_detector",
                    None,
                    "Duplicate lookup failed",
                    json!({ "owner_id": owner_id, "error": e.to_string() }),
                );
                None
            }
        }
    }
}
