use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::models::booking::Booking;
use crate::domain::models::events::PaymentEvent;
use crate::domain::ports::PaymentGateway;
use crate::error::AppError;
use crate::infra::retry::with_backoff;
use crate::infra::webhook_signature::verify_signature;

/// Raw envelope the payment provider posts. The booking id travels as the
/// checkout session's `client_reference_id`.
#[derive(Deserialize)]
struct PaymentWebhookEnvelope {
    #[serde(rename = "type")]
    kind: String,
    data: PaymentData,
}

#[derive(Deserialize)]
struct PaymentData {
    object: CheckoutSessionObject,
}

#[derive(Deserialize)]
struct CheckoutSessionObject {
    id: String,
    client_reference_id: Option<String>,
    failure_reason: Option<String>,
}

/// Signature-first normalization into a `PaymentEvent`; `Ok(None)` for event
/// kinds or payloads that are validly discarded.
pub fn normalize(secret: &str, signature_header: &str, body: &[u8]) -> Result<Option<PaymentEvent>, AppError> {
    verify_signature(secret, signature_header, body)?;

    let envelope: PaymentWebhookEnvelope = serde_json::from_slice(body)
        .map_err(|e| AppError::Validation(format!("Malformed payment webhook: {}", e)))?;

    let Some(booking_id) = envelope.data.object.client_reference_id else {
        warn!(kind = %envelope.kind, "Payment webhook without client_reference_id; discarding");
        return Ok(None);
    };

    match envelope.kind.as_str() {
        "checkout.session.completed" => Ok(Some(PaymentEvent::PaymentSucceeded {
            booking_id,
            payment_ref: envelope.data.object.id,
        })),
        "checkout.session.async_payment_failed" => Ok(Some(PaymentEvent::PaymentFailed {
            booking_id,
            payment_ref: envelope.data.object.id,
            reason: envelope
                .data
                .object
                .failure_reason
                .unwrap_or_else(|| "payment_failed".to_string()),
        })),
        other => {
            warn!(kind = %other, "Ignoring unknown payment event kind");
            Ok(None)
        }
    }
}

pub struct HttpPaymentGateway {
    client: Client,
    api_url: String,
    api_key: String,
    retry_attempts: u32,
    retry_base_ms: u64,
}

impl HttpPaymentGateway {
    pub fn new(api_url: String, api_key: String, retry_attempts: u32, retry_base_ms: u64) -> Self {
        Self {
            client: Client::new(),
            api_url,
            api_key,
            retry_attempts,
            retry_base_ms,
        }
    }
}

#[derive(Serialize)]
struct CreateCheckoutRequest<'a> {
    client_reference_id: &'a str,
    session_type_id: &'a str,
}

#[derive(Deserialize)]
struct CreateCheckoutResponse {
    id: String,
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_checkout_session(&self, booking: &Booking) -> Result<String, AppError> {
        with_backoff(self.retry_attempts, self.retry_base_ms, "payment create_checkout_session", || async {
            let res = self
                .client
                .post(format!("{}/checkout_sessions", self.api_url))
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&CreateCheckoutRequest {
                    client_reference_id: &booking.id,
                    session_type_id: &booking.session_type_id,
                })
                .send()
                .await
                .map_err(|e| AppError::GatewayUnavailable(format!("payment provider: {}", e)))?;

            if res.status().is_server_error() {
                return Err(AppError::GatewayUnavailable(format!(
                    "payment provider returned {}",
                    res.status()
                )));
            }
            if !res.status().is_success() {
                let status = res.status();
                let text = res.text().await.unwrap_or_default();
                return Err(AppError::Validation(format!(
                    "payment provider rejected checkout: {} {}",
                    status, text
                )));
            }

            let parsed: CreateCheckoutResponse = res
                .json()
                .await
                .map_err(|e| AppError::GatewayUnavailable(format!("payment provider: {}", e)))?;
            Ok(parsed.id)
        })
        .await
    }
}
