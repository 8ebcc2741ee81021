use thiserror::Error;

use crate::actor::Role;
use crate::history::HistoryError;
use crate::order::{OrderError, OrderStatus};

/// Why a status change (or another order operation) was refused.
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("Order not found: {0}")]
    NotFound(String),

    #[error("Invalid status: {0:?}")]
    InvalidStatus(String),

    #[error("Role {role} may not move order {order_id} from {current} to {requested}")]
    IllegalTransition {
        order_id: String,
        current: OrderStatus,
        requested: OrderStatus,
        role: Role,
    },

    #[error("Actor {actor_id} is not authorized: {reason}")]
    Unauthorized { actor_id: String, reason: String },

    /// The order changed between read and commit. Re-read and retry.
    #[error("Order {order_id} was modified concurrently")]
    Conflict { order_id: String },

    #[error("Storage error: {0}")]
    Store(String),
}

impl TransitionError {
    /// Stable machine-readable name, used in API bodies, metrics labels and
    /// audit events.
    pub fn kind(&self) -> &'static str {
        match self {
            TransitionError::NotFound(_) => "not_found",
            TransitionError::InvalidStatus(_) => "invalid_status",
            TransitionError::IllegalTransition { .. } => "illegal_transition",
            TransitionError::Unauthorized { .. } => "unauthorized",
            TransitionError::Conflict { .. } => "conflict",
            TransitionError::Store(_) => "store",
        }
    }

    /// Whether the request was refused, as opposed to failing on storage.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, TransitionError::Store(_))
    }
}

impl From<OrderError> for TransitionError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::NotFound(id) => TransitionError::NotFound(id),
            OrderError::VersionConflict { order_id, .. } => TransitionError::Conflict { order_id },
            other => TransitionError::Store(other.to_string()),
        }
    }
}

impl From<HistoryError> for TransitionError {
    fn from(err: HistoryError) -> Self {
        TransitionError::Store(err.to_string())
    }
}
