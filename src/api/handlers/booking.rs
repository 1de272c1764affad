use axum::{extract::{Path, State}, response::IntoResponse, Json};
use std::sync::Arc;
use tracing::info;

use crate::api::dtos::requests::InitiateBookingRequest;
use crate::api::dtos::responses::BookingInitiatedResponse;
use crate::domain::models::events::BookingEvent;
use crate::domain::services::initiation::InitiateRequest;
use crate::domain::services::reconciliation::ReconcileOutcome;
use crate::error::AppError;
use crate::state::AppState;

pub async fn initiate_booking(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<InitiateBookingRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (booking, scheduling_link) = state
        .initiation
        .initiate(InitiateRequest {
            provider_id: payload.provider_id,
            session_type_id: payload.session_type_id,
            start: payload.start,
            client_id: payload.client_id,
        })
        .await?;

    Ok(Json(BookingInitiatedResponse { booking, scheduling_link }))
}

pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let booking = state
        .booking_store
        .find_by_id(&booking_id)
        .await?
        .ok_or(AppError::NotFound("Booking not found".into()))?;

    Ok(Json(booking))
}

pub async fn get_booking_by_token(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let booking = state
        .booking_store
        .find_by_manage_token(&token)
        .await?
        .ok_or(AppError::NotFound("Booking not found".into()))?;

    Ok(Json(booking))
}

/// Client cancellation travels through the engine like every other event, so
/// it contends with concurrent webhooks on the same version token.
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let booking = state
        .booking_store
        .find_by_manage_token(&token)
        .await?
        .ok_or(AppError::NotFound("Booking not found".into()))?;

    let outcome = state
        .engine
        .apply(BookingEvent::CancellationRequested { booking_id: booking.id.clone() })
        .await?;

    let current = match outcome {
        ReconcileOutcome::Applied(b) => {
            info!("Booking cancelled via management token: {}", b.id);
            b
        }
        // Already cancelled: idempotent, return the stored record.
        _ => state
            .booking_store
            .find_by_id(&booking.id)
            .await?
            .ok_or(AppError::NotFound("Booking not found".into()))?,
    };

    Ok(Json(current))
}
