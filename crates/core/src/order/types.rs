//! Core order data types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Lifecycle
// ============================================================================

/// Lifecycle state of a parcel order.
///
/// Variants are declared in forward order; the derived `Ord` follows it, so
/// `a < b` means `b` comes later in the lifecycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Announced by the customer, not yet physically received.
    Incoming,
    /// Received and checked in at the forwarder's warehouse.
    ArrivedAtWarehouse,
    /// Consolidated and packed for outbound shipping.
    Packed,
    /// Waiting for the courier to collect it.
    AwaitingPickup,
    /// Handed to the courier.
    #[serde(alias = "shipped")]
    InTransit,
    /// Delivered to the customer.
    Delivered,
}

impl OrderStatus {
    /// Every status, in forward lifecycle order.
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Incoming,
        OrderStatus::ArrivedAtWarehouse,
        OrderStatus::Packed,
        OrderStatus::AwaitingPickup,
        OrderStatus::InTransit,
        OrderStatus::Delivered,
    ];

    /// Returns the status as its storage/API string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Incoming => "incoming",
            OrderStatus::ArrivedAtWarehouse => "arrived_at_warehouse",
            OrderStatus::Packed => "packed",
            OrderStatus::AwaitingPickup => "awaiting_pickup",
            OrderStatus::InTransit => "in_transit",
            OrderStatus::Delivered => "delivered",
        }
    }

    /// Position in the forward lifecycle (0-based).
    pub fn ordinal(&self) -> usize {
        *self as usize
    }

    /// Returns true for the last lifecycle state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered)
    }

    /// Milestone stamped the first time an order reaches this status.
    pub fn milestone(&self) -> Option<Milestone> {
        match self {
            OrderStatus::Incoming => None,
            OrderStatus::ArrivedAtWarehouse => Some(Milestone::Received),
            OrderStatus::Packed => Some(Milestone::Packed),
            OrderStatus::AwaitingPickup => None,
            OrderStatus::InTransit => Some(Milestone::Shipped),
            OrderStatus::Delivered => Some(Milestone::Delivered),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not one of the lifecycle states.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown order status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "incoming" => Ok(OrderStatus::Incoming),
            "arrived_at_warehouse" => Ok(OrderStatus::ArrivedAtWarehouse),
            "packed" => Ok(OrderStatus::Packed),
            "awaiting_pickup" => Ok(OrderStatus::AwaitingPickup),
            "in_transit" | "shipped" => Ok(OrderStatus::InTransit),
            "delivered" => Ok(OrderStatus::Delivered),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

// ============================================================================
// Milestones
// ============================================================================

/// Once-set timestamps marking the first arrival at a significant state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Milestone {
    Received,
    Packed,
    Shipped,
    Delivered,
}

impl Milestone {
    /// Column holding this milestone in the `orders` table.
    pub fn column(&self) -> &'static str {
        match self {
            Milestone::Received => "received_at",
            Milestone::Packed => "packed_at",
            Milestone::Shipped => "shipped_at",
            Milestone::Delivered => "delivered_at",
        }
    }
}

/// Milestone timestamps of an order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Milestones {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipped_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
}

impl Milestones {
    /// Get a milestone timestamp.
    pub fn get(&self, milestone: Milestone) -> Option<DateTime<Utc>> {
        match milestone {
            Milestone::Received => self.received_at,
            Milestone::Packed => self.packed_at,
            Milestone::Shipped => self.shipped_at,
            Milestone::Delivered => self.delivered_at,
        }
    }

    /// Stamp a milestone unless it is already set.
    ///
    /// Returns true if the timestamp was written.
    pub fn record(&mut self, milestone: Milestone, at: DateTime<Utc>) -> bool {
        let slot = match milestone {
            Milestone::Received => &mut self.received_at,
            Milestone::Packed => &mut self.packed_at,
            Milestone::Shipped => &mut self.shipped_at,
            Milestone::Delivered => &mut self.delivered_at,
        };
        if slot.is_some() {
            return false;
        }
        *slot = Some(at);
        true
    }
}

// ============================================================================
// Order
// ============================================================================

/// One shipped parcel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    /// Unique identifier (UUID).
    pub id: String,
    /// Current lifecycle status. Cached projection of the last history entry.
    pub status: OrderStatus,
    /// Owning forwarder (tenant).
    pub forwarder_id: String,
    /// Warehouse handling the parcel. Fixed for the order's lifetime.
    pub warehouse_id: String,
    /// Customer who announced the parcel.
    pub customer_id: String,
    /// Forwarder-issued tracking number, assigned at creation.
    pub tracking_number: String,
    /// Courier name, set at courier handoff.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub courier: Option<String>,
    /// Courier tracking number, set at courier handoff.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub courier_tracking_number: Option<String>,
    /// Free-text description of the contents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Milestone timestamps.
    pub milestones: Milestones,
    /// Optimistic concurrency counter, bumped by every accepted transition.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
