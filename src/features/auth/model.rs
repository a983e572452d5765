use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::shared::constants::{ROLE_ADMIN, ROLE_OPERATOR};

/// Caller identity extracted from a verified access token
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    /// Subject of the token; owns every document the user uploads
    pub sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub roles: Vec<String>,
}

impl AuthenticatedUser {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Operators may act on any owner's documents (e.g. re-queue stuck OCR jobs)
    pub fn is_operator(&self) -> bool {
        self.has_role(ROLE_OPERATOR) || self.has_role(ROLE_ADMIN)
    }

    /// Whether this user may act on a resource owned by `owner_id`
    pub fn can_access(&self, owner_id: &str) -> bool {
        self.sub == owner_id || self.is_operator()
    }
}

/// Application metadata block carried by the managed backend's access tokens
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppMetadata {
    #[serde(default)]
    pub roles: Vec<String>,
}
