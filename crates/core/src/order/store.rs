//! Order storage trait and types.

use thiserror::Error;

use super::{Order, OrderStatus};
use crate::actor::{Actor, ActorType};
use crate::history::{HistoryError, NewHistoryEntry, StatusHistoryEntry};

/// Error type for order storage operations.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Order not found: {0}")]
    NotFound(String),

    /// The order changed since it was read.
    #[error("Order {order_id} was modified concurrently (expected version {expected_version})")]
    VersionConflict {
        order_id: String,
        expected_version: i64,
    },

    #[error("Duplicate tracking number: {0}")]
    DuplicateTrackingNumber(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<HistoryError> for OrderError {
    fn from(err: HistoryError) -> Self {
        OrderError::Database(err.to_string())
    }
}

/// Request to register a new order.
#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub forwarder_id: String,
    pub warehouse_id: String,
    pub customer_id: String,
    /// Generated when not supplied.
    pub tracking_number: Option<String>,
    pub description: Option<String>,
    /// Actor recorded on the creation history entry.
    pub created_by: String,
    pub created_by_type: ActorType,
}

/// Filter for querying orders.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub warehouse_id: Option<String>,
    pub forwarder_id: Option<String>,
    pub customer_id: Option<String>,
    /// Any of these warehouses. An empty list matches nothing.
    pub warehouse_ids: Option<Vec<String>>,
    pub limit: i64,
    pub offset: i64,
}

impl OrderFilter {
    /// Create a new filter with defaults.
    pub fn new() -> Self {
        Self {
            status: None,
            warehouse_id: None,
            forwarder_id: None,
            customer_id: None,
            warehouse_ids: None,
            limit: 100,
            offset: 0,
        }
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_warehouse(mut self, warehouse_id: impl Into<String>) -> Self {
        self.warehouse_id = Some(warehouse_id.into());
        self
    }

    pub fn with_forwarder(mut self, forwarder_id: impl Into<String>) -> Self {
        self.forwarder_id = Some(forwarder_id.into());
        self
    }

    pub fn with_customer(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    pub fn within_warehouses(mut self, warehouse_ids: Vec<String>) -> Self {
        self.warehouse_ids = Some(warehouse_ids);
        self
    }

    /// Narrow the filter to orders `actor` may see.
    pub fn scoped_to(mut self, actor: &Actor) -> Self {
        if let Some(ref own) = actor.forwarder_id {
            if actor.actor_type != ActorType::System {
                if self.forwarder_id.as_ref().is_some_and(|f| f != own) {
                    return self.within_warehouses(Vec::new());
                }
                self.forwarder_id = Some(own.clone());
            }
        }
        match actor.actor_type {
            ActorType::System => self,
            ActorType::Forwarder if actor.forwarder_id.is_none() => {
                self.within_warehouses(Vec::new())
            }
            ActorType::Forwarder => self,
            ActorType::Staff => self.within_warehouses(actor.warehouse_ids.clone()),
        }
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// A validated status change ready to be committed.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub order_id: String,
    /// Version the caller read; the commit fails if the order moved on.
    pub expected_version: i64,
    /// History entry to append. Its `new_status` and `changed_at` are applied
    /// to the order.
    pub entry: NewHistoryEntry,
}

/// Trait for order storage backends.
pub trait OrderStore: Send + Sync {
    /// Create an order in `incoming` and append its creation history entry.
    fn create(&self, request: CreateOrderRequest) -> Result<Order, OrderError>;

    /// Get an order by ID.
    fn get(&self, id: &str) -> Result<Option<Order>, OrderError>;

    fn find_by_tracking_number(&self, tracking_number: &str)
        -> Result<Option<Order>, OrderError>;

    /// List orders matching the filter, newest first.
    fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>, OrderError>;

    /// Count orders matching the filter (ignores limit/offset).
    fn count(&self, filter: &OrderFilter) -> Result<i64, OrderError>;

    /// Apply a status change and append its history entry atomically.
    ///
    /// Either both the order row and the history entry are written, or
    /// neither is.
    fn commit_transition(
        &self,
        update: &StatusUpdate,
    ) -> Result<(Order, StatusHistoryEntry), OrderError>;

    /// Record the courier handling the parcel. Status and version are
    /// unchanged, so a transition racing with this still commits.
    fn assign_courier(
        &self,
        id: &str,
        courier: &str,
        courier_tracking_number: Option<&str>,
    ) -> Result<Order, OrderError>;
}
