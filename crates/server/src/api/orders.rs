//! Order API handlers: intake, queries, transitions and courier handoff.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use parcelhub_core::{
    Actor, AllowedStatuses, NewOrder, Order, OrderFilter, OrderStatus, Role, ScanData,
    TransitionContext,
};

use super::error::ApiError;
use super::middleware::AuthActor;
use crate::state::AppState;

/// Maximum allowed limit for order queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for order queries
const DEFAULT_LIMIT: i64 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for listing orders
#[derive(Debug, Deserialize)]
pub struct ListOrdersParams {
    pub status: Option<String>,
    pub warehouse_id: Option<String>,
    pub forwarder_id: Option<String>,
    pub customer_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ListOrdersResponse {
    pub orders: Vec<Order>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Request body for a status change
#[derive(Debug, Deserialize)]
pub struct TransitionBody {
    pub status: String,
    pub notes: Option<String>,
    /// Present when the change was triggered by scanning the parcel.
    pub scan: Option<ScanData>,
}

/// Request body for courier handoff
#[derive(Debug, Deserialize)]
pub struct CourierBody {
    pub courier: String,
    pub courier_tracking_number: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Register a new order
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Json(body): Json<NewOrder>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let order = state.intake().create(body, &actor)?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// List orders visible to the caller
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Query(params): Query<ListOrdersParams>,
) -> Result<Json<ListOrdersResponse>, ApiError> {
    if actor.effective_role() == Role::Unrecognized {
        return Err(ApiError::forbidden(format!(
            "Actor {} is not authorized: role is not recognized",
            actor.id
        )));
    }

    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = OrderFilter::new();
    if let Some(ref raw) = params.status {
        let status = raw
            .parse::<OrderStatus>()
            .map_err(|e| ApiError::bad_request("invalid_status", e.to_string()))?;
        filter = filter.with_status(status);
    }
    if let Some(ref warehouse_id) = params.warehouse_id {
        filter = filter.with_warehouse(warehouse_id);
    }
    if let Some(ref forwarder_id) = params.forwarder_id {
        filter = filter.with_forwarder(forwarder_id);
    }
    if let Some(ref customer_id) = params.customer_id {
        filter = filter.with_customer(customer_id);
    }
    let filter = filter.scoped_to(&actor);

    let orders = state
        .orders()
        .list(&filter.clone().with_limit(limit).with_offset(offset))?;
    let total = state.orders().count(&filter)?;

    Ok(Json(ListOrdersResponse {
        orders,
        total,
        limit,
        offset,
    }))
}

/// Load an order the caller may see.
fn visible_order(state: &AppState, actor: &Actor, id: &str) -> Result<Order, ApiError> {
    let order = state
        .orders()
        .get(id)?
        .ok_or_else(|| ApiError::not_found(format!("Order not found: {}", id)))?;

    if !actor.can_access(&order) {
        return Err(ApiError::forbidden(format!(
            "Actor {} is not authorized: order {} is outside the actor's scope",
            actor.id, order.id
        )));
    }
    Ok(order)
}

/// Get an order by ID
pub async fn get_order(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    visible_order(&state, &actor, &id).map(Json)
}

/// Apply a status change
pub async fn apply_transition(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
    Json(body): Json<TransitionBody>,
) -> Result<Json<Order>, ApiError> {
    let context = TransitionContext {
        scan_data: body.scan,
        notes: body.notes,
    };

    let order = state
        .executor()
        .apply_transition(&id, &body.status, &actor, context)?;
    Ok(Json(order))
}

/// Statuses the caller may move the order into
pub async fn allowed_statuses(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
) -> Result<Json<AllowedStatuses>, ApiError> {
    Ok(Json(state.executor().allowed_statuses(&id, &actor)?))
}

/// Record courier handoff
pub async fn assign_courier(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<String>,
    Json(body): Json<CourierBody>,
) -> Result<Json<Order>, ApiError> {
    let order = state.intake().assign_courier(
        &id,
        &body.courier,
        body.courier_tracking_number.as_deref(),
        &actor,
    )?;
    Ok(Json(order))
}
