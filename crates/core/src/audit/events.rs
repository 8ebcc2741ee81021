use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operational audit events.
///
/// Accepted status changes are recorded in the status history; this stream
/// covers everything around them: service lifecycle, order intake, refused
/// requests and scans that could not be applied.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    // System events
    ServiceStarted {
        version: String,
        config_hash: String,
    },
    ServiceStopped {
        reason: String,
    },

    // Order intake
    OrderCreated {
        order_id: String,
        created_by: String,
        forwarder_id: String,
        warehouse_id: String,
        tracking_number: String,
    },
    CourierAssigned {
        order_id: String,
        forwarder_id: String,
        assigned_by: String,
        courier: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        courier_tracking_number: Option<String>,
    },

    // Status changes
    /// An accepted status change. Mirrors the history entry for consumers of
    /// the operational stream.
    StatusChanged {
        order_id: String,
        forwarder_id: String,
        changed_by: String,
        from_status: String,
        to_status: String,
        /// Whether the change came from a physical scan.
        via_scan: bool,
    },
    /// A status change refused by the policy, the scope check or the
    /// concurrency check. Nothing was written to the order or its history.
    TransitionRejected {
        order_id: String,
        /// Owner of the order, when it was found.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        forwarder_id: Option<String>,
        actor_id: String,
        actor_role: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        current_status: Option<String>,
        requested_status: String,
        /// Error kind, e.g. `illegal_transition` or `conflict`.
        reason: String,
    },

    // Scans
    /// A scanned code matched no order.
    ScanUnresolved {
        barcode_value: String,
        actor_id: String,
        /// Forwarder of the scanning actor, if it belongs to one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        forwarder_id: Option<String>,
        requested_status: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        location: Option<String>,
    },
    /// A scanned code matched an order outside the actor's scope.
    ScanForbidden {
        order_id: String,
        /// Owner of the order that was scanned.
        forwarder_id: String,
        actor_id: String,
        barcode_value: String,
    },
}

impl AuditEvent {
    /// Returns the event type as a string for storage
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ServiceStarted { .. } => "service_started",
            Self::ServiceStopped { .. } => "service_stopped",
            Self::OrderCreated { .. } => "order_created",
            Self::CourierAssigned { .. } => "courier_assigned",
            Self::StatusChanged { .. } => "status_changed",
            Self::TransitionRejected { .. } => "transition_rejected",
            Self::ScanUnresolved { .. } => "scan_unresolved",
            Self::ScanForbidden { .. } => "scan_forbidden",
        }
    }

    /// Extract order_id if this event is order-related
    pub fn order_id(&self) -> Option<&str> {
        match self {
            Self::OrderCreated { order_id, .. }
            | Self::CourierAssigned { order_id, .. }
            | Self::StatusChanged { order_id, .. }
            | Self::TransitionRejected { order_id, .. }
            | Self::ScanForbidden { order_id, .. } => Some(order_id),
            Self::ServiceStarted { .. }
            | Self::ServiceStopped { .. }
            | Self::ScanUnresolved { .. } => None,
        }
    }

    /// Extract the acting user, if any
    pub fn actor_id(&self) -> Option<&str> {
        match self {
            Self::OrderCreated { created_by, .. } => Some(created_by),
            Self::CourierAssigned { assigned_by, .. } => Some(assigned_by),
            Self::StatusChanged { changed_by, .. } => Some(changed_by),
            Self::TransitionRejected { actor_id, .. }
            | Self::ScanUnresolved { actor_id, .. }
            | Self::ScanForbidden { actor_id, .. } => Some(actor_id),
            Self::ServiceStarted { .. } | Self::ServiceStopped { .. } => None,
        }
    }

    /// Tenant the event belongs to. Service events and scans by actors
    /// without a forwarder have none.
    pub fn forwarder_id(&self) -> Option<&str> {
        match self {
            Self::OrderCreated { forwarder_id, .. }
            | Self::CourierAssigned { forwarder_id, .. }
            | Self::StatusChanged { forwarder_id, .. }
            | Self::ScanForbidden { forwarder_id, .. } => Some(forwarder_id),
            Self::TransitionRejected { forwarder_id, .. }
            | Self::ScanUnresolved { forwarder_id, .. } => forwarder_id.as_deref(),
            Self::ServiceStarted { .. } | Self::ServiceStopped { .. } => None,
        }
    }
}

/// A stored audit event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub order_id: Option<String>,
    pub actor_id: Option<String>,
    pub forwarder_id: Option<String>,
    pub data: AuditEvent,
}

impl AuditRecord {
    /// Record for `event` with the indexed columns extracted. The store
    /// assigns `id`.
    pub fn new(timestamp: DateTime<Utc>, event: AuditEvent) -> Self {
        Self {
            id: 0,
            timestamp,
            event_type: event.event_type().to_string(),
            order_id: event.order_id().map(String::from),
            actor_id: event.actor_id().map(String::from),
            forwarder_id: event.forwarder_id().map(String::from),
            data: event,
        }
    }
}
