//! Status policy: which lifecycle states an actor may move an order into.
//!
//! The policy is a pure lookup over `(current status, role)`. Warehouse
//! workers and automated callers only advance an order to the next lifecycle
//! state, so a parcel cannot skip check-in or packing; supervisors,
//! managers and forwarder accounts may move to any other status, including
//! backwards to correct mistakes. Unknown roles get nothing.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::actor::Role;
use crate::order::OrderStatus;

/// How a role may move through the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authority {
    /// Only the status immediately after the current one.
    ForwardOnly,
    /// Any status other than the current one.
    Override,
    /// No transitions at all.
    Denied,
}

impl Authority {
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::WarehouseWorker | Role::System => Authority::ForwardOnly,
            Role::Supervisor | Role::Manager | Role::Forwarder => Authority::Override,
            Role::Unrecognized => Authority::Denied,
        }
    }
}

/// Legal next statuses for an order in `current` acted on by `role`.
pub fn valid_next_statuses(current: OrderStatus, role: Role) -> BTreeSet<OrderStatus> {
    let candidates = OrderStatus::ALL.into_iter();
    match Authority::for_role(role) {
        Authority::ForwardOnly => candidates
            .filter(|s| s.ordinal() == current.ordinal() + 1)
            .collect(),
        Authority::Override => candidates.filter(|s| *s != current).collect(),
        Authority::Denied => BTreeSet::new(),
    }
}

/// Whether `role` may move an order from `current` to `requested`.
pub fn is_allowed(current: OrderStatus, requested: OrderStatus, role: Role) -> bool {
    match Authority::for_role(role) {
        Authority::ForwardOnly => requested.ordinal() == current.ordinal() + 1,
        Authority::Override => requested != current,
        Authority::Denied => false,
    }
}

/// What an actor may do with an order right now, for rendering status
/// pickers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllowedStatuses {
    pub current_status: OrderStatus,
    pub role: Role,
    /// Legal targets in lifecycle order.
    pub allowed: Vec<OrderStatus>,
}

pub fn describe(current: OrderStatus, role: Role) -> AllowedStatuses {
    AllowedStatuses {
        current_status: current,
        role,
        allowed: valid_next_statuses(current, role).into_iter().collect(),
    }
}
