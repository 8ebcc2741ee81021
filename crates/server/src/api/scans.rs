//! Scan intake handler.

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use std::sync::Arc;

use parcelhub_core::{ScanOutcome, ScanRequest};

use super::error::ApiError;
use super::middleware::AuthActor;
use crate::state::AppState;

/// Request body for a scan
#[derive(Debug, Deserialize)]
pub struct ScanBody {
    /// Raw value read from the label.
    pub code: String,
    /// Status the scanning station applies.
    pub status: String,
    pub location: Option<String>,
    pub device_info: Option<String>,
    pub notes: Option<String>,
}

/// Process a raw scan.
///
/// Answers 200 with the updated order when the code resolved, and 202 with
/// the logged history entry when it did not.
pub async fn submit_scan(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Json(body): Json<ScanBody>,
) -> Result<(StatusCode, Json<ScanOutcome>), ApiError> {
    let request = ScanRequest {
        raw: body.code,
        requested_status: body.status,
        location: body.location,
        device_info: body.device_info,
        notes: body.notes,
    };

    let outcome = state.scans().process(&request, &actor)?;
    let status = match outcome {
        ScanOutcome::Applied(_) => StatusCode::OK,
        ScanOutcome::NotFound(_) => StatusCode::ACCEPTED,
    };
    Ok((status, Json(outcome)))
}
