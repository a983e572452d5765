use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Dossier, DossierStateUpdate};

/// What happened to a dossier. Stored as `event_type` plus a JSON `payload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum DossierEventKind {
    Created { title: String },
    DocumentAdded { document_id: Uuid },
    DocumentRemoved { document_id: Uuid },
    FolderAdded { folder_id: Uuid },
    FolderRemoved { folder_id: Uuid },
    StatusChanged { from: String, to: String },
    PhaseChanged { from: String, to: String },
    AdminStateChanged { from: String, to: String },
    Note { text: String },
}

impl DossierEventKind {
    pub fn event_type(&self) -> &'static str {
        match self {
            DossierEventKind::Created { .. } => "created",
            DossierEventKind::DocumentAdded { .. } => "document_added",
            DossierEventKind::DocumentRemoved { .. } => "document_removed",
            DossierEventKind::FolderAdded { .. } => "folder_added",
            DossierEventKind::FolderRemoved { .. } => "folder_removed",
            DossierEventKind::StatusChanged { .. } => "status_changed",
            DossierEventKind::PhaseChanged { .. } => "phase_changed",
            DossierEventKind::AdminStateChanged { .. } => "admin_state_changed",
            DossierEventKind::Note { .. } => "note",
        }
    }

    /// Split into the `(event_type, payload)` column pair
    pub fn to_parts(&self) -> (&'static str, Value) {
        let payload = serde_json::to_value(self)
            .ok()
            .and_then(|mut v| v.get_mut("payload").map(Value::take))
            .unwrap_or(Value::Null);
        (self.event_type(), payload)
    }

    pub fn from_parts(event_type: &str, payload: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::json!({
            "type": event_type,
            "payload": payload,
        }))
    }

    /// One event per field that actually changes
    pub fn for_state_change(current: &Dossier, update: &DossierStateUpdate) -> Vec<Self> {
        let mut events = Vec::new();

        if let Some(to) = update.status.as_ref().filter(|to| **to != current.status) {
            events.push(DossierEventKind::StatusChanged {
                from: current.status.clone(),
                to: to.clone(),
            });
        }
        if let Some(to) = update.phase.as_ref().filter(|to| **to != current.phase) {
            events.push(DossierEventKind::PhaseChanged {
                from: current.phase.clone(),
                to: to.clone(),
            });
        }
        if let Some(to) = update
            .admin_state
            .as_ref()
            .filter(|to| **to != current.admin_state)
        {
            events.push(DossierEventKind::AdminStateChanged {
                from: current.admin_state.clone(),
                to: to.clone(),
            });
        }

        events
    }
}

/// Timeline entry
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DossierEvent {
    pub id: Uuid,
    /// Insertion order; breaks ties between events with the same timestamp
    pub seq: i64,
    pub dossier_id: Uuid,
    #[serde(flatten)]
    pub kind: DossierEventKind,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDossierEvent {
    pub dossier_id: Uuid,
    pub kind: DossierEventKind,
    pub created_by: String,
}

#[derive(Debug, FromRow)]
pub struct DossierEventRow {
    pub id: Uuid,
    pub seq: i64,
    pub dossier_id: Uuid,
    pub event_type: String,
    pub payload: Value,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DossierEventRow> for DossierEvent {
    type Error = serde_json::Error;

    fn try_from(row: DossierEventRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            seq: row.seq,
            dossier_id: row.dossier_id,
            kind: DossierEventKind::from_parts(&row.event_type, row.payload)?,
            created_by: row.created_by,
            created_at: row.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dossier() -> Dossier {
        Dossier {
            id: Uuid::new_v4(),
            owner_id: "owner-1".to_string(),
            title: "Tax 2024".to_string(),
            status: "open".to_string(),
            phase: "collecting".to_string(),
            admin_state: "active".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_parts_round_trip_through_columns() {
        let kind = DossierEventKind::DocumentAdded {
            document_id: Uuid::nil(),
        };
        let (event_type, payload) = kind.to_parts();

        assert_eq!(event_type, "document_added");
        assert_eq!(payload["document_id"], Uuid::nil().to_string());
        assert_eq!(DossierEventKind::from_parts(event_type, payload).unwrap(), kind);
    }

    #[test]
    fn test_unknown_event_type_is_rejected() {
        assert!(DossierEventKind::from_parts("renamed", serde_json::json!({})).is_err());
    }

    #[test]
    fn test_state_change_emits_only_changed_fields() {
        let current = dossier();
        let update = DossierStateUpdate {
            status: Some("open".to_string()),
            phase: Some("review".to_string()),
            admin_state: Some("archived".to_string()),
        };

        let events = DossierEventKind::for_state_change(&current, &update);
        assert_eq!(
            events,
            vec![
                DossierEventKind::PhaseChanged {
                    from: "collecting".to_string(),
                    to: "review".to_string()
                },
                DossierEventKind::AdminStateChanged {
                    from: "active".to_string(),
                    to: "archived".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_event_serializes_flat_with_type_tag() {
        let event = DossierEvent {
            id: Uuid::nil(),
            seq: 7,
            dossier_id: Uuid::nil(),
            kind: DossierEventKind::Note {
                text: "called the accountant".to_string(),
            },
            created_by: "owner-1".to_string(),
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "note");
        assert_eq!(json["payload"]["text"], "called the accountant");
        assert_eq!(json["seq"], 7);
    }
}
