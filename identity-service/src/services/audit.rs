//! Audit sink: fire-and-forget consumer of security-state transitions.
//!
//! Callers dispatch events through `tokio::spawn`, so a slow or failing
//! sink can never block or fail the primary operation.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::models::AuditEvent;

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent);
}

/// Production default: structured log lines under the `audit` target,
/// picked up by whatever ships the service logs.
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: AuditEvent) {
        tracing::info!(
            target: "audit",
            actor_id = %event.actor_id,
            action = %event.action,
            entity_type = %event.entity_type,
            entity_id = ?event.entity_id,
            organization_id = ?event.organization_id,
            "audit event"
        );
    }
}

/// Test sink that keeps every event for assertions.
#[derive(Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn actions(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .map(|e| e.action)
            .collect()
    }
}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn record(&self, event: AuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
