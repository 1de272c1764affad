use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{error, warn};

use crate::domain::models::booking::Booking;
use crate::domain::models::events::SchedulingEvent;
use crate::domain::ports::SchedulingGateway;
use crate::error::AppError;
use crate::infra::retry::with_backoff;
use crate::infra::webhook_signature::verify_signature;

/// Raw envelope the calendar-scheduling provider posts to our webhook.
/// The booking id round-trips through `payload.tracking`, where the outbound
/// link put it.
#[derive(Deserialize)]
struct SchedulingWebhookEnvelope {
    event: String,
    payload: SchedulingPayload,
}

#[derive(Deserialize)]
struct SchedulingPayload {
    event_ref: String,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    tracking: Tracking,
}

#[derive(Deserialize, Default)]
struct Tracking {
    booking_id: Option<String>,
}

/// Verifies the signature, then normalizes the payload into a
/// `SchedulingEvent`. `Ok(None)` means "validly discarded": an event kind we
/// do not care about, or one we cannot correlate to a booking.
pub fn normalize(secret: &str, signature_header: &str, body: &[u8]) -> Result<Option<SchedulingEvent>, AppError> {
    verify_signature(secret, signature_header, body)?;

    let envelope: SchedulingWebhookEnvelope = serde_json::from_slice(body)
        .map_err(|e| AppError::Validation(format!("Malformed scheduling webhook: {}", e)))?;

    let Some(booking_id) = envelope.payload.tracking.booking_id else {
        warn!(event = %envelope.event, "Scheduling webhook without booking id tracking; discarding");
        return Ok(None);
    };

    match envelope.event.as_str() {
        "invitee.created" => {
            let (Some(start), Some(end)) = (envelope.payload.start_time, envelope.payload.end_time) else {
                return Err(AppError::Validation(
                    "invitee.created payload missing start or end time".into(),
                ));
            };
            Ok(Some(SchedulingEvent::EventCreated {
                booking_id,
                start,
                end,
                external_event_ref: envelope.payload.event_ref,
            }))
        }
        "invitee.canceled" => Ok(Some(SchedulingEvent::EventCancelled {
            booking_id,
            external_event_ref: envelope.payload.event_ref,
        })),
        other => {
            // The provider sends event kinds irrelevant to booking state.
            warn!(event = %other, "Ignoring unknown scheduling event kind");
            Ok(None)
        }
    }
}

/// Outbound side of the scheduling provider: link generation plus
/// best-effort event cancellation over its REST API.
pub struct HttpSchedulingGateway {
    client: Client,
    link_base: String,
    api_url: String,
    api_key: String,
    retry_attempts: u32,
    retry_base_ms: u64,
}

impl HttpSchedulingGateway {
    pub fn new(
        link_base: String,
        api_url: String,
        api_key: String,
        retry_attempts: u32,
        retry_base_ms: u64,
    ) -> Self {
        Self {
            client: Client::new(),
            link_base,
            api_url,
            api_key,
            retry_attempts,
            retry_base_ms,
        }
    }
}

#[async_trait]
impl SchedulingGateway for HttpSchedulingGateway {
    fn build_scheduling_link(&self, booking: &Booking) -> String {
        format!(
            "{}/{}/{}?tracking[booking_id]={}",
            self.link_base, booking.provider_id, booking.session_type_id, booking.id
        )
    }

    async fn cancel_event(&self, external_event_ref: &str) -> Result<(), AppError> {
        with_backoff(self.retry_attempts, self.retry_base_ms, "scheduling cancel_event", || async {
            let res = self
                .client
                .delete(format!("{}/events/{}", self.api_url, external_event_ref))
                .header("Authorization", format!("Bearer {}", self.api_key))
                .send()
                .await
                .map_err(|e| AppError::GatewayUnavailable(format!("scheduling provider: {}", e)))?;

            if res.status().is_server_error() {
                return Err(AppError::GatewayUnavailable(format!(
                    "scheduling provider returned {}",
                    res.status()
                )));
            }
            if !res.status().is_success() {
                let status = res.status();
                let text = res.text().await.unwrap_or_default();
                error!("Scheduling event cancellation rejected: {} {}", status, text);
                return Err(AppError::Validation(format!(
                    "scheduling provider rejected cancellation: {}",
                    status
                )));
            }
            Ok(())
        })
        .await
    }
}
