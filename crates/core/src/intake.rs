//! Order intake: registering orders and recording courier handoff.

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::actor::{Actor, Role};
use crate::audit::{AuditEvent, AuditHandle};
use crate::history::validate_order_ref;
use crate::metrics;
use crate::order::{CreateOrderRequest, Order, OrderError, OrderStore};

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("Actor {actor_id} is not authorized: {reason}")]
    Unauthorized { actor_id: String, reason: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Order(#[from] OrderError),
}

impl IntakeError {
    pub fn kind(&self) -> &'static str {
        match self {
            IntakeError::Unauthorized { .. } => "unauthorized",
            IntakeError::InvalidRequest(_) => "invalid_request",
            IntakeError::Order(OrderError::NotFound(_)) => "not_found",
            IntakeError::Order(OrderError::DuplicateTrackingNumber(_)) => "duplicate_tracking_number",
            IntakeError::Order(OrderError::VersionConflict { .. }) => "conflict",
            IntakeError::Order(OrderError::Database(_)) => "store",
        }
    }
}

/// Details of an order to register.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewOrder {
    /// Defaults to the creating actor's forwarder.
    #[serde(default)]
    pub forwarder_id: Option<String>,
    pub warehouse_id: String,
    pub customer_id: String,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Creates orders and records courier handoff on behalf of actors.
pub struct OrderIntake {
    orders: Arc<dyn OrderStore>,
    audit: Option<AuditHandle>,
}

impl OrderIntake {
    pub fn new(orders: Arc<dyn OrderStore>) -> Self {
        Self {
            orders,
            audit: None,
        }
    }

    pub fn with_audit(mut self, audit: AuditHandle) -> Self {
        self.audit = Some(audit);
        self
    }

    fn emit(&self, event: AuditEvent) {
        if let Some(ref audit) = self.audit {
            audit.try_emit(event);
        }
    }

    fn authorize(actor: &Actor, forwarder_id: &str, warehouse_id: &str) -> Result<(), IntakeError> {
        if actor.effective_role() == Role::Unrecognized {
            return Err(IntakeError::Unauthorized {
                actor_id: actor.id.clone(),
                reason: "role is not recognized".to_string(),
            });
        }
        if !actor.in_scope(forwarder_id, warehouse_id) {
            return Err(IntakeError::Unauthorized {
                actor_id: actor.id.clone(),
                reason: format!(
                    "warehouse {} of forwarder {} is outside the actor's scope",
                    warehouse_id, forwarder_id
                ),
            });
        }
        Ok(())
    }

    /// Register a new order with status `incoming`.
    pub fn create(&self, new_order: NewOrder, actor: &Actor) -> Result<Order, IntakeError> {
        let forwarder_id = new_order
            .forwarder_id
            .or_else(|| actor.forwarder_id.clone())
            .ok_or_else(|| IntakeError::InvalidRequest("forwarder_id is required".to_string()))?;

        for (field, value) in [
            ("forwarder_id", &forwarder_id),
            ("warehouse_id", &new_order.warehouse_id),
            ("customer_id", &new_order.customer_id),
        ] {
            if value.trim().is_empty() {
                return Err(IntakeError::InvalidRequest(format!("{} must not be empty", field)));
            }
        }

        let tracking_number = match new_order.tracking_number {
            Some(tn) => {
                let tn = tn.trim().to_string();
                validate_order_ref(&tn).map_err(|e| {
                    IntakeError::InvalidRequest(format!("tracking_number: {}", e))
                })?;
                Some(tn)
            }
            None => None,
        };

        if let Err(err) = Self::authorize(actor, &forwarder_id, &new_order.warehouse_id) {
            warn!(actor_id = %actor.id, error = %err, "Order creation refused");
            return Err(err);
        }

        let order = self.orders.create(CreateOrderRequest {
            forwarder_id,
            warehouse_id: new_order.warehouse_id,
            customer_id: new_order.customer_id,
            tracking_number,
            description: new_order.description,
            created_by: actor.id.clone(),
            created_by_type: actor.actor_type,
        })?;

        metrics::ORDERS_CREATED.inc();
        info!(
            order_id = %order.id,
            tracking_number = %order.tracking_number,
            warehouse_id = %order.warehouse_id,
            created_by = %actor.id,
            "Order created"
        );
        self.emit(AuditEvent::OrderCreated {
            order_id: order.id.clone(),
            created_by: actor.id.clone(),
            forwarder_id: order.forwarder_id.clone(),
            warehouse_id: order.warehouse_id.clone(),
            tracking_number: order.tracking_number.clone(),
        });

        Ok(order)
    }

    /// Record the courier taking over the parcel. Status is unchanged.
    pub fn assign_courier(
        &self,
        order_id: &str,
        courier: &str,
        courier_tracking_number: Option<&str>,
        actor: &Actor,
    ) -> Result<Order, IntakeError> {
        let courier = courier.trim();
        if courier.is_empty() {
            return Err(IntakeError::InvalidRequest("courier must not be empty".to_string()));
        }
        let courier_tracking_number = courier_tracking_number
            .map(str::trim)
            .filter(|tn| !tn.is_empty());

        let order = self
            .orders
            .get(order_id)?
            .ok_or_else(|| OrderError::NotFound(order_id.to_string()))?;
        Self::authorize(actor, &order.forwarder_id, &order.warehouse_id)?;

        let updated = self
            .orders
            .assign_courier(&order.id, courier, courier_tracking_number)?;

        info!(order_id = %updated.id, courier, actor_id = %actor.id, "Courier assigned");
        self.emit(AuditEvent::CourierAssigned {
            order_id: updated.id.clone(),
            forwarder_id: updated.forwarder_id.clone(),
            assigned_by: actor.id.clone(),
            courier: courier.to_string(),
            courier_tracking_number: courier_tracking_number.map(String::from),
        });

        Ok(updated)
    }
}
