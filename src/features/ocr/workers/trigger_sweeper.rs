use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

use crate::core::config::OcrConfig;
use crate::core::error::{AppError, Result};
use crate::features::documents::stores::DocumentStore;
use crate::features::ocr::services::TriggerDispatcher;

/// Background worker that re-sends the OCR trigger for jobs left queued.
///
/// Triggers are fire-and-forget, so a lost call would otherwise leave a job
/// queued until the next upload wakes the worker. Job state is not touched.
pub struct TriggerSweeper {
    store: Arc<dyn DocumentStore>,
    dispatcher: TriggerDispatcher,
    sweep_interval: Duration,
    stuck_after: Duration,
    batch_size: i64,
}

impl TriggerSweeper {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        dispatcher: TriggerDispatcher,
        config: &OcrConfig,
    ) -> Self {
        Self {
            store,
            dispatcher,
            sweep_interval: config.sweep_interval,
            stuck_after: config.stuck_after,
            batch_size: config.sweep_batch_size,
        }
    }

    /// Run the sweeper until `shutdown` is cancelled
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!(
            "Starting OCR trigger sweeper (interval: {:?}, stuck after: {:?})",
            self.sweep_interval,
            self.stuck_after
        );

        let mut interval = interval(self.sweep_interval);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }

            if let Err(e) = self.sweep().await {
                tracing::error!("Error sweeping stuck OCR jobs: {:?}", e);
            }
        }

        tracing::info!("OCR trigger sweeper stopped");
    }

    /// Re-trigger one batch of stuck jobs. Returns how many triggers succeeded.
    pub async fn sweep(&self) -> Result<usize> {
        let stuck_after = chrono::Duration::from_std(self.stuck_after)
            .map_err(|e| AppError::Internal(format!("Invalid stuck_after duration: {}", e)))?;
        let cutoff = Utc::now() - stuck_after;

        let stuck = self
            .store
            .list_stuck_queued(cutoff, self.batch_size)
            .await?;

        if stuck.is_empty() {
            return Ok(0);
        }

        tracing::info!("Re-triggering OCR worker for {} stuck jobs", stuck.len());

        let mut sent = 0;
        for document in stuck {
            if self.dispatcher.send(document.id).await {
                sent += 1;
            }
        }

        Ok(sent)
    }
}
