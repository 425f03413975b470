//! Audit event - emitted for every security-state mutation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub event_id: Uuid,
    pub actor_id: Uuid,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub organization_id: Option<Uuid>,
    pub occurred_utc: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(actor_id: Uuid, action: &str, entity_type: &str, entity_id: Option<Uuid>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            actor_id,
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id,
            organization_id: None,
            occurred_utc: Utc::now(),
        }
    }

    pub fn in_organization(mut self, organization_id: Uuid) -> Self {
        self.organization_id = Some(organization_id);
        self
    }
}
