use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::auth::model::AuthenticatedUser;
use crate::features::documents::models::Document;
use crate::features::documents::stores::DocumentStore;

pub struct DocumentService {
    store: Arc<dyn DocumentStore>,
}

impl DocumentService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, id: Uuid, user: &AuthenticatedUser) -> Result<Document> {
        let document = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Document {} not found", id)))?;

        if !user.can_access(&document.owner_id) {
            return Err(AppError::Forbidden(
                "You do not have access to this document".to_string(),
            ));
        }

        Ok(document)
    }

    /// Soft delete. The blob stays in storage; fingerprint lookups stop matching it.
    pub async fn delete(&self, id: Uuid, user: &AuthenticatedUser) -> Result<()> {
        self.get(id, user).await?;

        if !self.store.soft_delete(id).await? {
            return Err(AppError::NotFound(format!("Document {} not found", id)));
        }

        info!("Document {} deleted by {}", id, user.sub);
        Ok(())
    }
}
