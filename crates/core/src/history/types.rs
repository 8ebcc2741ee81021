use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::actor::{Actor, ActorType};
use crate::order::OrderStatus;

/// Tenant and warehouses of the actor behind a scan that matched no order.
///
/// With no order to check against, this decides who may read the entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanScope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forwarder_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warehouse_ids: Vec<String>,
}

impl ScanScope {
    pub fn of(actor: &Actor) -> Self {
        Self {
            forwarder_id: actor.forwarder_id.clone(),
            warehouse_ids: actor.warehouse_ids.clone(),
        }
    }

    /// Forwarders see their own staff's scans. Staff see scans made in one
    /// of their warehouses under the same forwarder (or none).
    pub fn visible_to(&self, actor: &Actor) -> bool {
        match actor.actor_type {
            ActorType::System => true,
            ActorType::Forwarder => {
                actor.forwarder_id.is_some() && self.forwarder_id == actor.forwarder_id
            }
            ActorType::Staff => {
                self.forwarder_id == actor.forwarder_id
                    && self
                        .warehouse_ids
                        .iter()
                        .any(|w| actor.warehouse_ids.contains(w))
            }
        }
    }
}

/// Context captured from a physical barcode/QR scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanData {
    /// Raw value read by the scanner.
    pub barcode_value: String,
    /// Where the scan happened (dock, shelf, city...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Scanner or device description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_info: Option<String>,
    /// Set only on scans that matched no order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<ScanScope>,
}

impl ScanData {
    pub fn new(barcode_value: impl Into<String>) -> Self {
        Self {
            barcode_value: barcode_value.into(),
            location: None,
            device_info: None,
            scope: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_device(mut self, device_info: impl Into<String>) -> Self {
        self.device_info = Some(device_info.into());
        self
    }
}

/// Immutable record of one status change (or failed scan attempt).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusHistoryEntry {
    pub id: String,
    /// Order the entry belongs to. For unresolved scans this is the raw
    /// scanned value and no order with that id exists.
    pub order_id: String,
    /// 1-based position within the order's history.
    pub sequence: i64,
    /// Status before the change; `None` for the creation entry.
    pub previous_status: Option<OrderStatus>,
    pub new_status: OrderStatus,
    /// Id of the actor that made the change.
    pub changed_by: String,
    pub changed_by_type: ActorType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_data: Option<ScanData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub changed_at: DateTime<Utc>,
}

impl StatusHistoryEntry {
    /// Whether `actor` may read this entry when no order backs it.
    pub fn visible_without_order(&self, actor: &Actor) -> bool {
        if actor.actor_type == ActorType::System {
            return true;
        }
        self.scan_data
            .as_ref()
            .and_then(|s| s.scope.as_ref())
            .is_some_and(|scope| scope.visible_to(actor))
    }
}

/// An entry waiting to be appended; the store assigns `id` and `sequence`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewHistoryEntry {
    pub order_id: String,
    pub previous_status: Option<OrderStatus>,
    pub new_status: OrderStatus,
    pub changed_by: String,
    pub changed_by_type: ActorType,
    pub scan_data: Option<ScanData>,
    pub notes: Option<String>,
    pub changed_at: DateTime<Utc>,
}

/// Point where a history replay stops forming a chain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "History chain broken at sequence {sequence}: expected previous status {expected:?}, found {found:?}"
)]
pub struct ChainBreak {
    pub sequence: i64,
    pub expected: Option<OrderStatus>,
    pub found: Option<OrderStatus>,
}
