use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use uuid::Uuid;

use crate::core::config::OcrConfig;
use crate::core::error::{AppError, Result};

/// Wakes up the external OCR worker. The worker finds queued jobs itself.
#[async_trait]
pub trait OcrTrigger: Send + Sync {
    /// `document_id` identifies the job that caused the call; it is not sent
    async fn trigger(&self, document_id: Uuid) -> Result<()>;
}

/// HTTP trigger for the worker function endpoint
pub struct OcrTriggerClient {
    client: reqwest::Client,
    url: String,
    token: String,
}

impl OcrTriggerClient {
    pub fn new(config: &OcrConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.trigger_timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: format!("{}/functions/process-ocr", config.functions_base_url),
            token: config.trigger_token.clone(),
        })
    }
}

#[async_trait]
impl OcrTrigger for OcrTriggerClient {
    async fn trigger(&self, document_id: Uuid) -> Result<()> {
        tracing::debug!("Triggering OCR worker for document {}", document_id);

        let response = self
            .client
            .post(&self.url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .send()
            .await
            .map_err(|e| AppError::ExternalServiceError(format!("OCR trigger failed: {}", e)))?;

        // Only the status matters; the body is never read
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::ExternalServiceError(format!(
                "OCR trigger returned HTTP {}",
                status
            )));
        }

        Ok(())
    }
}
