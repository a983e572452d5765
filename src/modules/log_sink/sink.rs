use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::entry::{LogEntry, LogLevel};
use super::store::LogStore;
use crate::core::config::LogSinkConfig;

/// Cheap, cloneable handle for queueing log entries
#[derive(Clone)]
pub struct LogSink {
    tx: mpsc::Sender<LogEntry>,
}

/// Owns the flusher task. Call [`LogSinkHandle::shutdown`] to drain it.
pub struct LogSinkHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl LogSink {
    /// Spawn the background flusher and return the sink plus its handle
    pub fn start(store: Arc<dyn LogStore>, config: &LogSinkConfig) -> (Self, LogSinkHandle) {
        let (tx, rx) = mpsc::channel(config.capacity.max(1));
        let token = CancellationToken::new();

        let flusher = Flusher {
            rx,
            store,
            batch_size: config.batch_size.max(1),
            buffer: Vec::with_capacity(config.batch_size.max(1)),
        };
        let task = tokio::spawn(flusher.run(config.flush_interval, token.clone()));

        info!(
            "Log sink started (capacity: {}, batch: {}, interval: {:?})",
            config.capacity, config.batch_size, config.flush_interval
        );

        (Self { tx }, LogSinkHandle { token, task })
    }

    /// Queue an entry without waiting. Returns false if it was dropped.
    pub fn record(&self, entry: LogEntry) -> bool {
        match self.tx.try_send(entry) {
            Ok(()) => true,
            Err(TrySendError::Full(entry)) => {
                warn!(
                    source = %entry.source,
                    "Log sink queue full, dropping entry: {}",
                    entry.message
                );
                false
            }
            Err(TrySendError::Closed(entry)) => {
                debug!("Log sink closed, dropping entry: {}", entry.message);
                false
            }
        }
    }

    pub fn warn(
        &self,
        source: &str,
        document_id: Option<Uuid>,
        message: impl Into<String>,
        context: Value,
    ) {
        self.record_with(LogLevel::Warn, source, document_id, message, context);
    }

    pub fn error(
        &self,
        source: &str,
        document_id: Option<Uuid>,
        message: impl Into<String>,
        context: Value,
    ) {
        self.record_with(LogLevel::Error, source, document_id, message, context);
    }

    fn record_with(
        &self,
        level: LogLevel,
        source: &str,
        document_id: Option<Uuid>,
        message: impl Into<String>,
        context: Value,
    ) {
        let mut entry = LogEntry::new(level, source, message).with_context(context);
        if let Some(id) = document_id {
            entry = entry.with_document(id);
        }
        self.record(entry);
    }
}

impl LogSinkHandle {
    /// Stop accepting new entries, flush what is queued and wait for the task
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            warn!("Log sink flusher ended abnormally: {}", e);
        }
    }
}

struct Flusher {
    rx: mpsc::Receiver<LogEntry>,
    store: Arc<dyn LogStore>,
    batch_size: usize,
    buffer: Vec<LogEntry>,
}

impl Flusher {
    async fn run(mut self, flush_interval: std::time::Duration, token: CancellationToken) {
        let start = tokio::time::Instant::now() + flush_interval;
        let mut ticker = tokio::time::interval_at(start, flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                received = self.rx.recv() => match received {
                    Some(entry) => {
                        self.buffer.push(entry);
                        if self.buffer.len() >= self.batch_size {
                            self.flush().await;
                        }
                    }
                    None => break,
                },
                _ = ticker.tick() => self.flush().await,
            }
        }

        // Drain whatever is still queued
        self.rx.close();
        while let Some(entry) = self.rx.recv().await {
            self.buffer.push(entry);
        }
        self.flush().await;

        info!("Log sink stopped");
    }

    async fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }

        let batch = std::mem::take(&mut self.buffer);
        match self.store.write_batch(&batch).await {
            Ok(()) => debug!("Flushed {} log entries", batch.len()),
            Err(e) => warn!("Failed to flush {} log entries: {}", batch.len(), e),
        }
    }
}
