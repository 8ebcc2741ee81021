use std::sync::Arc;

use tokio::sync::mpsc;

use super::{AuditEventEnvelope, AuditHandle, AuditRecord, AuditStore};

/// Background task that receives audit events and writes them to storage
pub struct AuditWriter {
    rx: mpsc::Receiver<AuditEventEnvelope>,
    store: Arc<dyn AuditStore>,
}

impl AuditWriter {
    pub fn new(rx: mpsc::Receiver<AuditEventEnvelope>, store: Arc<dyn AuditStore>) -> Self {
        Self { rx, store }
    }

    /// Run the writer, consuming events until every handle is dropped.
    ///
    /// Spawn this as a background task. Storage failures are logged and the
    /// event is dropped; the writer keeps running.
    pub async fn run(mut self) {
        tracing::info!("Audit writer started");
        let mut written: u64 = 0;

        while let Some(envelope) = self.rx.recv().await {
            let record = AuditRecord::new(envelope.timestamp, envelope.event);

            match self.store.insert(&record) {
                Ok(_) => written += 1,
                Err(e) => tracing::error!(
                    event_type = %record.event_type,
                    error = %e,
                    "Failed to write audit event"
                ),
            }
        }

        tracing::info!(written, "Audit writer shutting down");
    }
}

/// Create the audit pipeline.
///
/// Returns the `AuditHandle` to clone into whatever emits events and the
/// `AuditWriter` to spawn with `tokio::spawn(writer.run())`. `buffer_size`
/// bounds the channel; `try_emit` drops events when it is full.
pub fn create_audit_system(
    store: Arc<dyn AuditStore>,
    buffer_size: usize,
) -> (AuditHandle, AuditWriter) {
    let (tx, rx) = mpsc::channel(buffer_size);
    let handle = AuditHandle::new(tx);
    let writer = AuditWriter::new(rx, store);
    (handle, writer)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::audit::{AuditError, AuditEvent, AuditFilter};

    /// Store that keeps records in memory, optionally failing every insert.
    struct MemoryStore {
        records: Mutex<Vec<AuditRecord>>,
        should_fail: bool,
    }

    impl MemoryStore {
        fn new(should_fail: bool) -> Arc<Self> {
            Arc::new(Self {
                records: Mutex::new(Vec::new()),
                should_fail,
            })
        }

        fn records(&self) -> Vec<AuditRecord> {
            self.records.lock().unwrap().clone()
        }
    }

    impl AuditStore for MemoryStore {
        fn insert(&self, record: &AuditRecord) -> Result<i64, AuditError> {
            if self.should_fail {
                return Err(AuditError::Database("disk full".to_string()));
            }
            let mut records = self.records.lock().unwrap();
            let mut stored = record.clone();
            stored.id = records.len() as i64 + 1;
            records.push(stored);
            Ok(records.len() as i64)
        }

        fn query(&self, _filter: &AuditFilter) -> Result<Vec<AuditRecord>, AuditError> {
            Ok(self.records())
        }

        fn count(&self, _filter: &AuditFilter) -> Result<i64, AuditError> {
            Ok(self.records.lock().unwrap().len() as i64)
        }
    }

    fn rejected(order_id: &str) -> AuditEvent {
        AuditEvent::TransitionRejected {
            order_id: order_id.to_string(),
            forwarder_id: Some("fwd-1".to_string()),
            actor_id: "worker-7".to_string(),
            actor_role: "warehouse_worker".to_string(),
            current_status: Some("incoming".to_string()),
            requested_status: "packed".to_string(),
            reason: "illegal_transition".to_string(),
        }
    }

    #[tokio::test]
    async fn test_writer_stores_events_with_extracted_ids() {
        let store = MemoryStore::new(false);
        let (handle, writer) = create_audit_system(store.clone(), 10);
        let writer_task = tokio::spawn(writer.run());

        handle.emit(rejected("o-1")).await;
        handle
            .emit(AuditEvent::ServiceStopped {
                reason: "test".to_string(),
            })
            .await;

        // Closing the last handle ends the writer after it drains the queue.
        drop(handle);
        writer_task.await.unwrap();

        let records = store.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].event_type, "transition_rejected");
        assert_eq!(records[0].order_id.as_deref(), Some("o-1"));
        assert_eq!(records[0].actor_id.as_deref(), Some("worker-7"));
        assert_eq!(records[0].forwarder_id.as_deref(), Some("fwd-1"));
        assert_eq!(records[1].order_id, None);
    }

    #[tokio::test]
    async fn test_writer_survives_store_failures() {
        let store = MemoryStore::new(true);
        let (handle, writer) = create_audit_system(store.clone(), 10);
        let writer_task = tokio::spawn(writer.run());

        handle.emit(rejected("o-1")).await;
        drop(handle);

        writer_task.await.unwrap();
        assert!(store.records().is_empty());
    }

    #[tokio::test]
    async fn test_writer_waits_for_every_clone() {
        let store = MemoryStore::new(false);
        let (handle, writer) = create_audit_system(store.clone(), 10);
        let writer_task = tokio::spawn(writer.run());

        let clones: Vec<_> = (0..3).map(|_| handle.clone()).collect();
        drop(handle);

        futures::future::join_all(
            clones
                .iter()
                .enumerate()
                .map(|(i, h)| h.emit(rejected(&format!("o-{}", i)))),
        )
        .await;

        tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
        assert!(!writer_task.is_finished());

        drop(clones);
        writer_task.await.unwrap();
        assert_eq!(store.records().len(), 3);
    }

    #[test]
    fn test_try_emit_from_sync_code_is_drained() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let store = MemoryStore::new(false);
        let (handle, writer) = create_audit_system(store.clone(), 10);

        assert!(handle.try_emit(rejected("o-1")));
        drop(handle);

        runtime.block_on(writer.run());
        assert_eq!(store.records().len(), 1);
    }
}
