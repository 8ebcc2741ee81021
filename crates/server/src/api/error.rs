//! Mapping of domain errors to HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use parcelhub_core::{
    AuditError, HistoryError, IntakeError, OrderError, OrderStatus, Role, ScanError,
    TransitionError,
};

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_status: Option<OrderStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_status: Option<OrderStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

/// An error ready to be sent to the client.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                error: message.into(),
                kind,
                current_status: None,
                requested_status: None,
                role: None,
            },
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "unauthorized", message)
    }

    pub fn bad_request(kind: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, kind, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(error = %message, "Request failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "store", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<TransitionError> for ApiError {
    fn from(err: TransitionError) -> Self {
        let message = err.to_string();
        match err {
            TransitionError::NotFound(_) => Self::not_found(message),
            TransitionError::InvalidStatus(_) => Self::bad_request("invalid_status", message),
            TransitionError::IllegalTransition {
                current,
                requested,
                role,
                ..
            } => {
                let mut api = Self::new(StatusCode::CONFLICT, "illegal_transition", message);
                api.body.current_status = Some(current);
                api.body.requested_status = Some(requested);
                api.body.role = Some(role);
                api
            }
            TransitionError::Unauthorized { .. } => Self::forbidden(message),
            TransitionError::Conflict { .. } => {
                Self::new(StatusCode::CONFLICT, "conflict", message)
            }
            TransitionError::Store(_) => Self::internal(message),
        }
    }
}

impl From<ScanError> for ApiError {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::InvalidScanCode(_) => Self::bad_request("invalid_scan_code", err.to_string()),
            ScanError::Transition(inner) => inner.into(),
        }
    }
}

impl From<IntakeError> for ApiError {
    fn from(err: IntakeError) -> Self {
        let kind = err.kind();
        let message = err.to_string();
        match err {
            IntakeError::Unauthorized { .. } => Self::forbidden(message),
            IntakeError::InvalidRequest(_) => Self::bad_request(kind, message),
            IntakeError::Order(inner) => inner.into(),
        }
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        let message = err.to_string();
        match err {
            OrderError::NotFound(_) => Self::not_found(message),
            OrderError::DuplicateTrackingNumber(_) => {
                Self::new(StatusCode::CONFLICT, "duplicate_tracking_number", message)
            }
            OrderError::VersionConflict { .. } => {
                Self::new(StatusCode::CONFLICT, "conflict", message)
            }
            OrderError::Database(_) => Self::internal(message),
        }
    }
}

impl From<HistoryError> for ApiError {
    fn from(err: HistoryError) -> Self {
        match err {
            HistoryError::InvalidOrderId(_) => Self::bad_request("invalid_order_id", err.to_string()),
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<AuditError> for ApiError {
    fn from(err: AuditError) -> Self {
        Self::internal(format!("Failed to query audit events: {}", err))
    }
}
