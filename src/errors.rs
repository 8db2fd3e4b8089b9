use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

use crate::carriers::FulfillmentStep;

/// Error body returned by every failing endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Not Found",
    "message": "Shipment 990e8400-e29b-41d4-a716-446655440000 not found",
    "details": null,
    "timestamp": "2026-08-31T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Additional error details (validation errors, offending step)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

/// Application-wide service error type
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Queue error: {0}")]
    QueueError(String),

    /// A label-generation step failed against the carrier. The shipment is
    /// left at its last durably reached state; `retryable` tells the queue
    /// layer whether backoff retries make sense.
    #[error("Fulfillment failed at {step}: {message}")]
    FulfillmentFailed {
        step: FulfillmentStep,
        message: String,
        retryable: bool,
    },

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ServiceError {
    /// Whether the queue layer should retry the task that produced this error
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::FulfillmentFailed { retryable, .. } => *retryable,
            ServiceError::DatabaseError(_) => true,
            _ => false,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::ValidationError(_) | ServiceError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::InvalidOperation(_) => StatusCode::CONFLICT,
            ServiceError::FulfillmentFailed { .. } => StatusCode::BAD_GATEWAY,
            ServiceError::DatabaseError(_)
            | ServiceError::EventError(_)
            | ServiceError::QueueError(_)
            | ServiceError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let details = match &self {
            ServiceError::FulfillmentFailed { step, .. } => Some(format!("step: {}", step)),
            _ => None,
        };

        let body = ErrorResponse {
            error: status
                .canonical_reason()
                .unwrap_or("Unknown Error")
                .to_string(),
            message: self.to_string(),
            details,
            timestamp: Utc::now().to_rfc3339(),
        };

        (status, Json(body)).into_response()
    }
}
