use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use super::{ScanCode, ScanError};
use crate::actor::{Actor, Role};
use crate::audit::AuditEvent;
use crate::history::{ScanData, StatusHistoryEntry};
use crate::metrics;
use crate::order::{Order, OrderStatus, OrderStore};
use crate::transition::{TransitionContext, TransitionError, TransitionExecutor};

/// One scan submitted by a scanning device.
#[derive(Debug, Clone, Default)]
pub struct ScanRequest {
    pub raw: String,
    pub requested_status: String,
    pub location: Option<String>,
    pub device_info: Option<String>,
    pub notes: Option<String>,
}

/// Result of a processed scan.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", content = "result", rename_all = "snake_case")]
pub enum ScanOutcome {
    /// The code resolved to an order and the status change was committed.
    Applied(Order),
    /// The code matched no order; the attempt was logged under the raw value.
    NotFound(StatusHistoryEntry),
}

/// Turns raw scans into status transitions.
pub struct ScanProcessor {
    orders: Arc<dyn OrderStore>,
    executor: Arc<TransitionExecutor>,
}

impl ScanProcessor {
    pub fn new(orders: Arc<dyn OrderStore>, executor: Arc<TransitionExecutor>) -> Self {
        Self { orders, executor }
    }

    pub fn process(&self, request: &ScanRequest, actor: &Actor) -> Result<ScanOutcome, ScanError> {
        let result = self.process_inner(request, actor);

        let outcome = match &result {
            Ok(ScanOutcome::Applied(_)) => "applied",
            Ok(ScanOutcome::NotFound(_)) => "not_found",
            Err(ScanError::InvalidScanCode(_)) => "invalid",
            Err(ScanError::Transition(TransitionError::Unauthorized { .. })) => "forbidden",
            Err(ScanError::Transition(_)) => "rejected",
        };
        metrics::SCANS_PROCESSED.with_label_values(&[outcome]).inc();

        result
    }

    fn process_inner(&self, request: &ScanRequest, actor: &Actor) -> Result<ScanOutcome, ScanError> {
        let code = ScanCode::parse(&request.raw)?;

        let requested: OrderStatus = request
            .requested_status
            .parse()
            .map_err(|_| TransitionError::InvalidStatus(request.requested_status.clone()))?;

        if actor.effective_role() == Role::Unrecognized {
            return Err(TransitionError::Unauthorized {
                actor_id: actor.id.clone(),
                reason: "role is not recognized".to_string(),
            }
            .into());
        }

        let scan_data = ScanData {
            barcode_value: code.raw.clone(),
            location: request.location.clone(),
            device_info: request.device_info.clone(),
            scope: None,
        };

        let Some(order) = self.resolve(&code)? else {
            let entry = self
                .executor
                .log_unresolved_scan(&code.raw, requested, actor, scan_data)?;
            return Ok(ScanOutcome::NotFound(entry));
        };

        if !actor.can_access(&order) {
            warn!(
                order_id = %order.id,
                actor_id = %actor.id,
                "Scanned order is outside the actor's scope"
            );
            self.executor.emit(AuditEvent::ScanForbidden {
                order_id: order.id.clone(),
                forwarder_id: order.forwarder_id.clone(),
                actor_id: actor.id.clone(),
                barcode_value: code.raw.clone(),
            });
            return Err(TransitionError::Unauthorized {
                actor_id: actor.id.clone(),
                reason: format!("order {} is outside the actor's scope", order.id),
            }
            .into());
        }

        let mut context = TransitionContext::new().with_scan(scan_data);
        context.notes = request.notes.clone();

        let updated = self.executor.apply_transition(
            &order.id,
            requested.as_str(),
            actor,
            context,
        )?;
        Ok(ScanOutcome::Applied(updated))
    }

    /// Find the order a code refers to: by order id first, then by tracking
    /// number.
    fn resolve(&self, code: &ScanCode) -> Result<Option<Order>, TransitionError> {
        if let Some(ref id) = code.order_id {
            if let Some(order) = self.orders.get(id)? {
                return Ok(Some(order));
            }
        }
        if let Some(ref tracking_number) = code.tracking_number {
            if let Some(order) = self.orders.find_by_tracking_number(tracking_number)? {
                return Ok(Some(order));
            }
        }
        Ok(None)
    }
}
