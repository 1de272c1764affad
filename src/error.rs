use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Closed error taxonomy of the booking core. Callers pattern-match on these
/// variants instead of catching; webhook handlers rely on the HTTP mapping to
/// control provider redelivery.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Authentication required")]
    AuthenticationRequired,
    #[error("Webhook signature invalid")]
    SignatureInvalid,
    #[error("Requested slot is unavailable")]
    SlotUnavailable,
    #[error("Duplicate booking id: {0}")]
    DuplicateId(String),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
    // Internal to the engine's CAS loop; surfaces only if retries are exhausted.
    #[error("Stored version does not match expected version")]
    VersionConflict,
    #[error("External gateway unavailable: {0}")]
    GatewayUnavailable(String),
    #[error("Reconciliation retries exhausted for booking {0}")]
    ReconciliationFailed(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Database(e) => {
                error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::AuthenticationRequired => {
                (StatusCode::UNAUTHORIZED, "Authentication required".to_string())
            }
            AppError::SignatureInvalid => {
                (StatusCode::UNAUTHORIZED, "Webhook signature invalid".to_string())
            }
            AppError::SlotUnavailable => {
                (StatusCode::CONFLICT, "Requested slot is unavailable".to_string())
            }
            AppError::DuplicateId(id) => {
                (StatusCode::CONFLICT, format!("Duplicate booking id: {}", id))
            }
            AppError::InvalidTransition(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::VersionConflict => {
                // Should be resolved inside the engine; treat a leak as a conflict.
                (StatusCode::CONFLICT, "Concurrent modification".to_string())
            }
            AppError::GatewayUnavailable(msg) => {
                error!("Gateway unavailable: {}", msg);
                (StatusCode::BAD_GATEWAY, "External gateway unavailable".to_string())
            }
            AppError::ReconciliationFailed(id) => {
                error!("Reconciliation failed for booking {}", id);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
