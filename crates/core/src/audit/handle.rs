use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use super::AuditEvent;

/// Envelope wrapping an audit event with metadata
#[derive(Debug, Clone)]
pub struct AuditEventEnvelope {
    pub timestamp: DateTime<Utc>,
    pub event: AuditEvent,
}

/// Handle for emitting audit events
///
/// Cheap to clone. Events go through a bounded channel to the
/// [`AuditWriter`](super::AuditWriter). Emitting never fails the caller: a
/// full or closed channel is logged and counted in
/// `parcelhub_audit_events_dropped_total`, and the event is lost.
#[derive(Clone)]
pub struct AuditHandle {
    tx: mpsc::Sender<AuditEventEnvelope>,
}

impl AuditHandle {
    pub fn new(tx: mpsc::Sender<AuditEventEnvelope>) -> Self {
        Self { tx }
    }

    fn envelope(event: AuditEvent) -> AuditEventEnvelope {
        AuditEventEnvelope {
            timestamp: Utc::now(),
            event,
        }
    }

    /// Emit an event, waiting for channel capacity.
    pub async fn emit(&self, event: AuditEvent) {
        if let Err(e) = self.tx.send(Self::envelope(event)).await {
            tracing::error!("Failed to emit audit event: {}", e);
        }
    }

    /// Emit without waiting. Returns false if the event was dropped.
    ///
    /// Order operations are synchronous and may run inside request handlers,
    /// so they emit through this.
    pub fn try_emit(&self, event: AuditEvent) -> bool {
        match self.tx.try_send(Self::envelope(event)) {
            Ok(()) => true,
            Err(e) => {
                let event_type = e.into_inner().event.event_type();
                crate::metrics::AUDIT_EVENTS_DROPPED
                    .with_label_values(&[event_type])
                    .inc();
                tracing::warn!(event_type, "Audit event dropped: channel full or closed");
                false
            }
        }
    }
}
