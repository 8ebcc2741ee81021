//! Status history (audit trail viewer) handler.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use parcelhub_core::{history::verify_entries, Role, StatusHistoryEntry};

use super::error::ApiError;
use super::middleware::AuthActor;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub order_id: String,
    pub entries: Vec<StatusHistoryEntry>,
    pub total: usize,
    /// Whether every entry continues from the previous one.
    pub chain_intact: bool,
}

/// Chronological status history of an order.
///
/// Unresolved scans are stored under the raw scanned value, which has no
/// order; those entries are limited to actors sharing the scanner's scope.
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    if actor.effective_role() == Role::Unrecognized {
        return Err(ApiError::forbidden(format!(
            "Actor {} is not authorized: role is not recognized",
            actor.id
        )));
    }

    let order = state.orders().get(&id)?;
    if let Some(ref order) = order {
        if !actor.can_access(order) {
            return Err(ApiError::forbidden(format!(
                "Actor {} is not authorized: order {} is outside the actor's scope",
                actor.id, order.id
            )));
        }
    }

    let mut entries = state.executor().history().get_history(&id)?;
    if order.is_none() {
        if entries.is_empty() {
            return Err(ApiError::not_found(format!("Order not found: {}", id)));
        }
        entries.retain(|entry| entry.visible_without_order(&actor));
        if entries.is_empty() {
            return Err(ApiError::forbidden(format!(
                "Actor {} is not authorized: scans of {} are outside the actor's scope",
                actor.id, id
            )));
        }
    }

    let chain_intact = verify_entries(&entries).is_ok();
    Ok(Json(HistoryResponse {
        order_id: id,
        total: entries.len(),
        entries,
        chain_intact,
    }))
}
