use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::TransitionError;
use crate::actor::{Actor, Role};
use crate::audit::{AuditEvent, AuditHandle, AuditRecord, AuditStore};
use crate::db;
use crate::history::{self, HistoryLogger, ScanData, ScanScope, StatusHistoryEntry};
use crate::metrics;
use crate::order::{Order, OrderStatus, OrderStore, StatusUpdate};
use crate::policy::{self, AllowedStatuses};

/// Note stored on history entries for scans that matched no order.
pub const NOT_FOUND_NOTE: &str = "order not found";

/// Optional metadata attached to a status change.
#[derive(Debug, Clone, Default)]
pub struct TransitionContext {
    pub scan_data: Option<ScanData>,
    pub notes: Option<String>,
}

impl TransitionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scan(mut self, scan_data: ScanData) -> Self {
        self.scan_data = Some(scan_data);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Validates status changes against the policy and commits them.
pub struct TransitionExecutor {
    orders: Arc<dyn OrderStore>,
    history: HistoryLogger,
    audit: Option<AuditHandle>,
    rejection_log: Option<Arc<dyn AuditStore>>,
}

impl TransitionExecutor {
    pub fn new(orders: Arc<dyn OrderStore>, history: HistoryLogger) -> Self {
        Self {
            orders,
            history,
            audit: None,
            rejection_log: None,
        }
    }

    /// Emit operational audit events through the background writer.
    pub fn with_audit(mut self, audit: AuditHandle) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Record refused changes as `transition_rejected`.
    ///
    /// Rejections go straight to `store` before `apply_transition` returns,
    /// so a busy audit channel cannot lose them.
    pub fn with_rejection_log(mut self, store: Arc<dyn AuditStore>) -> Self {
        self.rejection_log = Some(store);
        self
    }

    pub fn history(&self) -> &HistoryLogger {
        &self.history
    }

    pub(crate) fn emit(&self, event: AuditEvent) {
        if let Some(ref audit) = self.audit {
            audit.try_emit(event);
        }
    }

    /// Move an order to `requested_status` on behalf of `actor`.
    ///
    /// On success the order row and one history entry are written in a
    /// single transaction. On any error nothing is written.
    pub fn apply_transition(
        &self,
        order_id: &str,
        requested_status: &str,
        actor: &Actor,
        context: TransitionContext,
    ) -> Result<Order, TransitionError> {
        let mut loaded: Option<Order> = None;
        let result = self.try_apply(order_id, requested_status, actor, context, &mut loaded);

        if let Err(ref err) = result {
            self.record_rejection(order_id, requested_status, actor, loaded.as_ref(), err);
        }

        result
    }

    fn try_apply(
        &self,
        order_id: &str,
        requested_status: &str,
        actor: &Actor,
        context: TransitionContext,
        loaded: &mut Option<Order>,
    ) -> Result<Order, TransitionError> {
        let order = self
            .orders
            .get(order_id)?
            .ok_or_else(|| TransitionError::NotFound(order_id.to_string()))?;
        *loaded = Some(order.clone());

        let requested: OrderStatus = requested_status
            .parse()
            .map_err(|_| TransitionError::InvalidStatus(requested_status.to_string()))?;

        Self::check_actor(actor, &order)?;

        let role = actor.effective_role();
        let allowed = policy::is_allowed(order.status, requested, role);
        debug!(
            order_id = %order.id,
            current = %order.status,
            requested = %requested,
            role = %role,
            allowed,
            "Policy evaluated"
        );
        if !allowed {
            return Err(TransitionError::IllegalTransition {
                order_id: order.id,
                current: order.status,
                requested,
                role,
            });
        }

        // Never stamp earlier than the last change, even if the clock stepped
        // back, so history stays in chronological order.
        let changed_at = db::now().max(order.updated_at);
        let via_scan = context.scan_data.is_some();
        let update = StatusUpdate {
            order_id: order.id.clone(),
            expected_version: order.version,
            entry: history::entry_for(
                &order.id,
                Some(order.status),
                requested,
                actor,
                context.scan_data,
                context.notes,
                changed_at,
            ),
        };

        let started = Instant::now();
        let (updated, entry) = self.orders.commit_transition(&update)?;
        metrics::TRANSITION_COMMIT_DURATION
            .with_label_values(&[])
            .observe(started.elapsed().as_secs_f64());

        metrics::STATUS_TRANSITIONS
            .with_label_values(&[order.status.as_str(), requested.as_str()])
            .inc();
        info!(
            order_id = %updated.id,
            from = %order.status,
            to = %updated.status,
            actor_id = %actor.id,
            role = %role,
            sequence = entry.sequence,
            via_scan,
            "Order status changed"
        );
        self.emit(AuditEvent::StatusChanged {
            order_id: updated.id.clone(),
            forwarder_id: updated.forwarder_id.clone(),
            changed_by: actor.id.clone(),
            from_status: order.status.to_string(),
            to_status: updated.status.to_string(),
            via_scan,
        });

        Ok(updated)
    }

    fn check_actor(actor: &Actor, order: &Order) -> Result<(), TransitionError> {
        if actor.effective_role() == Role::Unrecognized {
            return Err(TransitionError::Unauthorized {
                actor_id: actor.id.clone(),
                reason: "role is not recognized".to_string(),
            });
        }
        if !actor.can_access(order) {
            return Err(TransitionError::Unauthorized {
                actor_id: actor.id.clone(),
                reason: format!("order {} is outside the actor's scope", order.id),
            });
        }
        Ok(())
    }

    fn record_rejection(
        &self,
        order_id: &str,
        requested_status: &str,
        actor: &Actor,
        order: Option<&Order>,
        err: &TransitionError,
    ) {
        if !err.is_rejection() {
            warn!(order_id, actor_id = %actor.id, error = %err, "Transition failed");
            return;
        }

        metrics::TRANSITIONS_REJECTED
            .with_label_values(&[err.kind()])
            .inc();
        warn!(
            order_id,
            actor_id = %actor.id,
            requested = requested_status,
            reason = err.kind(),
            "Transition rejected: {}",
            err
        );

        let Some(ref log) = self.rejection_log else {
            return;
        };
        let event = AuditEvent::TransitionRejected {
            order_id: order_id.to_string(),
            forwarder_id: order.map(|o| o.forwarder_id.clone()),
            actor_id: actor.id.clone(),
            actor_role: actor.effective_role().to_string(),
            current_status: order.map(|o| o.status.to_string()),
            requested_status: requested_status.to_string(),
            reason: err.kind().to_string(),
        };
        if let Err(e) = log.insert(&AuditRecord::new(db::now(), event)) {
            metrics::AUDIT_EVENTS_DROPPED
                .with_label_values(&["transition_rejected"])
                .inc();
            warn!(order_id, error = %e, "Failed to record rejected transition");
        }
    }

    /// Statuses `actor` may move the order into.
    pub fn allowed_statuses(
        &self,
        order_id: &str,
        actor: &Actor,
    ) -> Result<AllowedStatuses, TransitionError> {
        let order = self
            .orders
            .get(order_id)?
            .ok_or_else(|| TransitionError::NotFound(order_id.to_string()))?;

        if !actor.can_access(&order) {
            return Err(TransitionError::Unauthorized {
                actor_id: actor.id.clone(),
                reason: format!("order {} is outside the actor's scope", order.id),
            });
        }

        Ok(policy::describe(order.status, actor.effective_role()))
    }

    /// Record a scan that resolved to no order.
    ///
    /// The raw scanned value becomes the entry's order reference. No order is
    /// touched.
    pub fn log_unresolved_scan(
        &self,
        raw_value: &str,
        requested: OrderStatus,
        actor: &Actor,
        scan_data: ScanData,
    ) -> Result<StatusHistoryEntry, TransitionError> {
        let location = scan_data.location.clone();
        let scan_data = ScanData {
            scope: Some(ScanScope::of(actor)),
            ..scan_data
        };
        let entry = self.history.log_transition(
            raw_value,
            None,
            requested,
            actor,
            Some(scan_data),
            Some(NOT_FOUND_NOTE.to_string()),
        )?;

        warn!(
            barcode_value = raw_value,
            actor_id = %actor.id,
            requested = %requested,
            "Scanned code matched no order"
        );
        self.emit(AuditEvent::ScanUnresolved {
            barcode_value: raw_value.to_string(),
            actor_id: actor.id.clone(),
            forwarder_id: actor.forwarder_id.clone(),
            requested_status: requested.to_string(),
            location,
        });

        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, TestBed};

    #[test]
    fn test_worker_moves_one_step_forward() {
        let bed = TestBed::new();
        let order = bed.create_order("wh-1", "fwd-1");
        let scan = ScanData::new(order.id.clone()).with_location("dock 3");

        let updated = bed
            .executor
            .apply_transition(
                &order.id,
                "arrived_at_warehouse",
                &fixtures::worker("wh-1"),
                TransitionContext::new().with_scan(scan.clone()),
            )
            .unwrap();

        assert_eq!(updated.status, OrderStatus::ArrivedAtWarehouse);
        assert_eq!(updated.version, order.version + 1);
        assert!(updated.milestones.received_at.is_some());

        let history = bed.executor.history().get_history(&order.id).unwrap();
        assert_eq!(history.len(), 2);
        let last = &history[1];
        assert_eq!(last.previous_status, Some(OrderStatus::Incoming));
        assert_eq!(last.new_status, OrderStatus::ArrivedAtWarehouse);
        assert_eq!(last.changed_by, "worker-1");
        assert_eq!(last.scan_data.as_ref(), Some(&scan));
        assert_eq!(last.changed_at, updated.updated_at);

        assert!(matches!(
            bed.audit_events().as_slice(),
            [AuditEvent::StatusChanged { via_scan: true, .. }]
        ));
    }

    #[test]
    fn test_illegal_transition_writes_nothing() {
        let bed = TestBed::new();
        let order = bed.create_order("wh-1", "fwd-1");

        let err = bed
            .executor
            .apply_transition(&order.id, "packed", &fixtures::worker("wh-1"), TransitionContext::new())
            .unwrap_err();

        match err {
            TransitionError::IllegalTransition {
                current,
                requested,
                role,
                ..
            } => {
                assert_eq!(current, OrderStatus::Incoming);
                assert_eq!(requested, OrderStatus::Packed);
                assert_eq!(role, Role::WarehouseWorker);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert_eq!(bed.store.get(&order.id).unwrap().unwrap(), order);
        assert_eq!(bed.executor.history().count(&order.id).unwrap(), 1);

        assert!(bed.audit_events().is_empty());
        let rejections = bed.rejections();
        assert!(matches!(
            rejections.as_slice(),
            [AuditEvent::TransitionRejected {
                reason,
                current_status: Some(current),
                forwarder_id: Some(fwd),
                ..
            }] if reason == "illegal_transition" && current == "incoming" && fwd == "fwd-1"
        ));
    }

    #[test]
    fn test_manager_moves_backward() {
        let bed = TestBed::new();
        let order = bed.create_order("wh-1", "fwd-1");
        let manager = fixtures::manager("wh-1");

        bed.executor
            .apply_transition(&order.id, "delivered", &manager, TransitionContext::new())
            .unwrap();
        let updated = bed
            .executor
            .apply_transition(
                &order.id,
                "packed",
                &manager,
                TransitionContext::new().with_notes("returned by courier"),
            )
            .unwrap();

        assert_eq!(updated.status, OrderStatus::Packed);
        let latest = bed.executor.history().latest(&order.id).unwrap().unwrap();
        assert_eq!(latest.previous_status, Some(OrderStatus::Delivered));
        assert_eq!(latest.notes.as_deref(), Some("returned by courier"));
        assert_eq!(bed.executor.history().verify_chain(&order.id).unwrap(), Some(OrderStatus::Packed));
    }

    #[test]
    fn test_same_status_is_refused_for_everyone() {
        let bed = TestBed::new();
        let order = bed.create_order("wh-1", "fwd-1");

        for actor in [fixtures::manager("wh-1"), fixtures::forwarder("fwd-1"), fixtures::system()] {
            let err = bed
                .executor
                .apply_transition(&order.id, "incoming", &actor, TransitionContext::new())
                .unwrap_err();
            assert!(matches!(err, TransitionError::IllegalTransition { .. }));
        }
    }

    #[test]
    fn test_unknown_order_and_status() {
        let bed = TestBed::new();
        let order = bed.create_order("wh-1", "fwd-1");
        let worker = fixtures::worker("wh-1");

        let err = bed
            .executor
            .apply_transition("nope", "packed", &worker, TransitionContext::new())
            .unwrap_err();
        assert!(matches!(err, TransitionError::NotFound(ref id) if id == "nope"));

        let err = bed
            .executor
            .apply_transition(&order.id, "lost", &worker, TransitionContext::new())
            .unwrap_err();
        assert!(matches!(err, TransitionError::InvalidStatus(ref s) if s == "lost"));
        assert_eq!(bed.executor.history().count(&order.id).unwrap(), 1);
    }

    #[test]
    fn test_scope_and_unrecognized_role_are_unauthorized() {
        let bed = TestBed::new();
        let order = bed.create_order("wh-1", "fwd-1");

        for actor in [
            fixtures::worker("wh-2"),
            fixtures::forwarder("fwd-2"),
            Actor::anonymous(),
            Actor::staff("s-9", Role::Unrecognized, vec!["wh-1".to_string()]),
        ] {
            let err = bed
                .executor
                .apply_transition(&order.id, "arrived_at_warehouse", &actor, TransitionContext::new())
                .unwrap_err();
            assert!(
                matches!(err, TransitionError::Unauthorized { .. }),
                "{} should be refused, got {err:?}",
                actor.id
            );
        }
        assert_eq!(bed.store.get(&order.id).unwrap().unwrap().status, OrderStatus::Incoming);
    }

    #[test]
    fn test_staff_cannot_borrow_forwarder_or_system_powers() {
        let bed = TestBed::new();
        let order = bed.create_order("wh-1", "fwd-1");
        let wh = vec!["wh-1".to_string()];

        let as_forwarder = Actor::staff("s-1", Role::Forwarder, wh.clone());
        let err = bed
            .executor
            .apply_transition(&order.id, "delivered", &as_forwarder, TransitionContext::new())
            .unwrap_err();
        assert!(matches!(err, TransitionError::Unauthorized { .. }), "got {err:?}");

        let as_system = Actor::staff("s-2", Role::System, wh);
        let err = bed
            .executor
            .apply_transition(&order.id, "arrived_at_warehouse", &as_system, TransitionContext::new())
            .unwrap_err();
        assert!(matches!(err, TransitionError::Unauthorized { .. }), "got {err:?}");

        assert_eq!(bed.store.get(&order.id).unwrap().unwrap().status, OrderStatus::Incoming);
        assert_eq!(bed.rejections().len(), 2);
    }

    #[test]
    fn test_rejections_survive_a_full_audit_channel() {
        let store = Arc::new(crate::order::SqliteOrderStore::in_memory().unwrap());
        let audit_store = Arc::new(crate::audit::SqliteAuditStore::in_memory().unwrap());
        let (tx, _rx) = tokio::sync::mpsc::channel(1);
        let executor = TransitionExecutor::new(store.clone(), HistoryLogger::new(store.clone()))
            .with_audit(AuditHandle::new(tx))
            .with_rejection_log(audit_store.clone());
        let order = store
            .create(fixtures::create_request("fwd-1", "wh-1"))
            .unwrap();

        for requested in ["packed", "shipped", "delivered"] {
            executor
                .apply_transition(&order.id, requested, &fixtures::worker("wh-1"), TransitionContext::new())
                .unwrap_err();
        }

        let filter = crate::audit::AuditFilter::new().with_event_type("transition_rejected");
        assert_eq!(audit_store.count(&filter).unwrap(), 3);
    }

    #[test]
    fn test_rejections_not_audited_when_disabled() {
        let store = Arc::new(crate::order::SqliteOrderStore::in_memory().unwrap());
        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        let executor = TransitionExecutor::new(store.clone(), HistoryLogger::new(store.clone()))
            .with_audit(AuditHandle::new(tx));
        let order = store
            .create(fixtures::create_request("fwd-1", "wh-1"))
            .unwrap();

        executor
            .apply_transition(&order.id, "delivered", &fixtures::worker("wh-1"), TransitionContext::new())
            .unwrap_err();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_allowed_statuses() {
        let bed = TestBed::new();
        let order = bed.create_order("wh-1", "fwd-1");

        let view = bed
            .executor
            .allowed_statuses(&order.id, &fixtures::worker("wh-1"))
            .unwrap();
        assert_eq!(view.current_status, OrderStatus::Incoming);
        assert_eq!(view.allowed, vec![OrderStatus::ArrivedAtWarehouse]);

        let view = bed
            .executor
            .allowed_statuses(&order.id, &fixtures::supervisor("wh-1"))
            .unwrap();
        assert_eq!(view.allowed.len(), 5);

        assert!(matches!(
            bed.executor.allowed_statuses(&order.id, &fixtures::worker("wh-2")),
            Err(TransitionError::Unauthorized { .. })
        ));
    }

    #[test]
    fn test_unresolved_scan_is_logged_under_raw_value() {
        let bed = TestBed::new();
        let worker = fixtures::worker("wh-1");

        let entry = bed
            .executor
            .log_unresolved_scan(
                "XYZ-999",
                OrderStatus::ArrivedAtWarehouse,
                &worker,
                ScanData::new("XYZ-999").with_location("dock 1"),
            )
            .unwrap();

        assert_eq!(entry.order_id, "XYZ-999");
        assert_eq!(entry.previous_status, None);
        assert_eq!(entry.new_status, OrderStatus::ArrivedAtWarehouse);
        assert_eq!(entry.notes.as_deref(), Some(NOT_FOUND_NOTE));
        assert!(bed.store.get("XYZ-999").unwrap().is_none());
        let scope = entry.scan_data.as_ref().and_then(|s| s.scope.as_ref()).unwrap();
        assert_eq!(scope.warehouse_ids, vec!["wh-1"]);
        assert_eq!(scope.forwarder_id, None);

        assert!(matches!(
            bed.audit_events().as_slice(),
            [AuditEvent::ScanUnresolved { barcode_value, .. }] if barcode_value == "XYZ-999"
        ));
    }
}
