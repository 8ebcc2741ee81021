//! Testing utilities: fixtures and a fully wired in-memory test bed.
//!
//! # Example
//!
//! ```rust,ignore
//! use parcelhub_core::testing::{fixtures, TestBed};
//!
//! let bed = TestBed::new();
//! let order = bed.create_order("wh-1", "fwd-1");
//! bed.executor
//!     .apply_transition(&order.id, "arrived_at_warehouse", &fixtures::worker("wh-1"), Default::default())
//!     .unwrap();
//! ```

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::audit::{AuditEvent, AuditEventEnvelope, AuditFilter, AuditHandle, AuditStore, SqliteAuditStore};
use crate::history::HistoryLogger;
use crate::intake::OrderIntake;
use crate::order::{Order, OrderStore, SqliteOrderStore};
use crate::scan::ScanProcessor;
use crate::transition::TransitionExecutor;

const AUDIT_CAPACITY: usize = 256;

/// Order store, executor, intake and scan processor sharing one database,
/// with audit events captured in memory and rejections written to an
/// in-memory audit store.
pub struct TestBed {
    pub store: Arc<SqliteOrderStore>,
    pub audit_store: Arc<SqliteAuditStore>,
    pub executor: Arc<TransitionExecutor>,
    pub intake: OrderIntake,
    pub scans: ScanProcessor,
    audit_rx: Mutex<mpsc::Receiver<AuditEventEnvelope>>,
}

impl TestBed {
    pub fn new() -> Self {
        let store = SqliteOrderStore::in_memory().expect("in-memory order store");
        Self::with_store(Arc::new(store))
    }

    pub fn with_store(store: Arc<SqliteOrderStore>) -> Self {
        let (tx, rx) = mpsc::channel(AUDIT_CAPACITY);
        let audit = AuditHandle::new(tx);
        let audit_store = Arc::new(SqliteAuditStore::in_memory().expect("in-memory audit store"));

        let executor = Arc::new(
            TransitionExecutor::new(store.clone(), HistoryLogger::new(store.clone()))
                .with_audit(audit.clone())
                .with_rejection_log(audit_store.clone()),
        );
        let intake = OrderIntake::new(store.clone()).with_audit(audit);
        let scans = ScanProcessor::new(store.clone(), executor.clone());

        Self {
            store,
            audit_store,
            executor,
            intake,
            scans,
            audit_rx: Mutex::new(rx),
        }
    }

    /// Create an `incoming` order directly in the store.
    pub fn create_order(&self, warehouse_id: &str, forwarder_id: &str) -> Order {
        self.store
            .create(fixtures::create_request(forwarder_id, warehouse_id))
            .expect("create order")
    }

    /// Drain the audit events emitted since the last call.
    pub fn audit_events(&self) -> Vec<AuditEvent> {
        let mut rx = self.audit_rx.lock().expect("audit receiver lock");
        let mut events = Vec::new();
        while let Ok(envelope) = rx.try_recv() {
            events.push(envelope.event);
        }
        events
    }

    /// Recorded `transition_rejected` events, oldest first.
    pub fn rejections(&self) -> Vec<AuditEvent> {
        let filter = AuditFilter::new().with_event_type("transition_rejected");
        let mut records = self.audit_store.query(&filter).expect("query rejections");
        records.reverse();
        records.into_iter().map(|r| r.data).collect()
    }
}

impl Default for TestBed {
    fn default() -> Self {
        Self::new()
    }
}

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::Utc;
    use uuid::Uuid;

    use crate::actor::{Actor, ActorType, Role};
    use crate::order::{generate_tracking_number, CreateOrderRequest, Milestones, Order, OrderStatus};

    /// Unsaved order in the given status.
    pub fn order(warehouse_id: &str, forwarder_id: &str, status: OrderStatus) -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4().to_string(),
            status,
            forwarder_id: forwarder_id.to_string(),
            warehouse_id: warehouse_id.to_string(),
            customer_id: "cust-1".to_string(),
            tracking_number: generate_tracking_number(),
            courier: None,
            courier_tracking_number: None,
            description: None,
            milestones: Milestones::default(),
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn create_request(forwarder_id: &str, warehouse_id: &str) -> CreateOrderRequest {
        CreateOrderRequest {
            forwarder_id: forwarder_id.to_string(),
            warehouse_id: warehouse_id.to_string(),
            customer_id: "cust-1".to_string(),
            tracking_number: None,
            description: Some("Two pairs of shoes".to_string()),
            created_by: "intake".to_string(),
            created_by_type: ActorType::System,
        }
    }

    pub fn worker(warehouse_id: &str) -> Actor {
        Actor::staff("worker-1", Role::WarehouseWorker, vec![warehouse_id.to_string()])
    }

    pub fn supervisor(warehouse_id: &str) -> Actor {
        Actor::staff("supervisor-1", Role::Supervisor, vec![warehouse_id.to_string()])
    }

    pub fn manager(warehouse_id: &str) -> Actor {
        Actor::staff("manager-1", Role::Manager, vec![warehouse_id.to_string()])
    }

    pub fn forwarder(forwarder_id: &str) -> Actor {
        Actor::forwarder(forwarder_id)
    }

    pub fn system() -> Actor {
        Actor::system("courier-webhook")
    }
}
