use axum::{
    body::Body,
    extract::Request,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use crate::state::AppState;
use crate::api::handlers::{availability, booking, health, webhook};
use tower_http::{
    trace::TraceLayer,
    classify::ServerErrorsFailureClass,
};
use tracing::{info_span, Span, error, info};
use uuid::Uuid;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))

        // Booking lifecycle
        .route("/api/v1/bookings", post(booking::initiate_booking))
        .route("/api/v1/bookings/{booking_id}", get(booking::get_booking))
        .route("/api/v1/bookings/manage/{token}", get(booking::get_booking_by_token))
        .route("/api/v1/bookings/manage/{token}/cancel", post(booking::cancel_booking))

        // Availability
        .route("/api/v1/providers/{provider_id}/slots", get(availability::get_slots))

        // Provider callbacks
        .route("/api/v1/webhooks/scheduling", post(webhook::scheduling_webhook))
        .route("/api/v1/webhooks/payments", post(webhook::payment_webhook))

        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<Body>| {
                    let request_id = Uuid::new_v4().to_string();
                    info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = ?request.method(),
                        uri = ?request.uri(),
                        version = ?request.version(),
                        booking_id = tracing::field::Empty,
                    )
                })
                .on_request(|request: &Request<Body>, _span: &Span| {
                    info!("started processing request: {} {}", request.method(), request.uri().path());
                })
                .on_response(|response: &axum::http::Response<Body>, latency: Duration, _span: &Span| {
                    info!(
                        status = response.status().as_u16(),
                        latency_ms = latency.as_millis(),
                        "finished processing request"
                    );
                })
                .on_failure(|error: ServerErrorsFailureClass, _latency: Duration, _span: &Span| {
                    error!("request failed: {:?}", error);
                })
        )
        .with_state(state)
}
