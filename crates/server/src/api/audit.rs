use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use parcelhub_core::{AuditFilter, AuditRecord, Role};

use super::error::ApiError;
use super::middleware::AuthActor;
use crate::state::AppState;

/// Maximum allowed limit for audit queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for audit queries
const DEFAULT_LIMIT: i64 = 100;

/// Query parameters for audit endpoint
#[derive(Debug, Deserialize)]
pub struct AuditQueryParams {
    pub order_id: Option<String>,
    /// One event type or a comma-separated list of them
    pub event_type: Option<String>,
    pub actor_id: Option<String>,
    /// Events at or after this timestamp (ISO 8601)
    pub from: Option<DateTime<Utc>>,
    /// Events at or before this timestamp (ISO 8601)
    pub to: Option<DateTime<Utc>>,
    /// Default 100, max 1000
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Response for audit query endpoint
#[derive(Debug, Serialize)]
pub struct AuditQueryResponse {
    pub events: Vec<AuditRecord>,
    /// Total number of matching events
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Query operational audit events. Warehouse workers and unrecognized
/// actors are refused; actors belonging to a forwarder only see that
/// forwarder's events.
pub async fn query_audit(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Query(params): Query<AuditQueryParams>,
) -> Result<Json<AuditQueryResponse>, ApiError> {
    if matches!(
        actor.effective_role(),
        Role::Unrecognized | Role::WarehouseWorker
    ) {
        return Err(ApiError::forbidden(format!(
            "Actor {} is not authorized to read the audit stream",
            actor.id
        )));
    }

    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut base_filter = AuditFilter::new();
    if let Some(ref order_id) = params.order_id {
        base_filter = base_filter.for_order(order_id);
    }
    if let Some(ref event_types) = params.event_type {
        for event_type in event_types.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            base_filter = base_filter.with_event_type(event_type);
        }
    }
    if let Some(ref actor_id) = params.actor_id {
        base_filter = base_filter.by_actor(actor_id);
    }
    if params.from.is_some() || params.to.is_some() {
        base_filter = base_filter.with_time_range(params.from, params.to);
    }
    let base_filter = base_filter.scoped_to(&actor);

    let query_filter = AuditFilter {
        limit,
        offset,
        ..base_filter.clone()
    };

    let events = state.audit_store().query(&query_filter)?;
    let total = state.audit_store().count(&base_filter)?;

    Ok(Json(AuditQueryResponse {
        events,
        total,
        limit,
        offset,
    }))
}
