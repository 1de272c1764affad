use axum::{body::Bytes, extract::State, http::HeaderMap, response::IntoResponse, Json};
use std::sync::Arc;
use tracing::info;

use crate::api::dtos::responses::WebhookAck;
use crate::domain::models::events::BookingEvent;
use crate::domain::services::reconciliation::ReconcileOutcome;
use crate::error::AppError;
use crate::infra::{payments, scheduling};
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "webhook-signature";

/// Inbound calendar-provider webhook. Signature is verified before anything
/// is parsed; unknown event kinds and unknown booking ids are acknowledged
/// with 200 so the provider stops redelivering them.
pub async fn scheduling_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let signature = signature_header(&headers)?;
    let event = scheduling::normalize(
        &state.config.scheduling_webhook_secret,
        signature,
        &body,
    )?;

    let Some(event) = event else {
        return Ok(Json(WebhookAck::ignored()));
    };

    match state.engine.apply(BookingEvent::Scheduling(event)).await? {
        ReconcileOutcome::Applied(booking) => {
            info!(booking_id = %booking.id, "Scheduling webhook applied");
            Ok(Json(WebhookAck::applied()))
        }
        ReconcileOutcome::NoOp | ReconcileOutcome::UnknownBooking => {
            Ok(Json(WebhookAck::ignored()))
        }
    }
}

pub async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let signature = signature_header(&headers)?;
    let event = payments::normalize(
        &state.config.payment_webhook_secret,
        signature,
        &body,
    )?;

    let Some(event) = event else {
        return Ok(Json(WebhookAck::ignored()));
    };

    match state.engine.apply(BookingEvent::Payment(event)).await? {
        ReconcileOutcome::Applied(booking) => {
            info!(booking_id = %booking.id, "Payment webhook applied");
            Ok(Json(WebhookAck::applied()))
        }
        ReconcileOutcome::NoOp | ReconcileOutcome::UnknownBooking => {
            Ok(Json(WebhookAck::ignored()))
        }
    }
}

fn signature_header(headers: &HeaderMap) -> Result<&str, AppError> {
    headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::SignatureInvalid)
}
