use serde::Serialize;

use crate::domain::models::booking::Booking;
use crate::domain::services::availability::Slot;

#[derive(Serialize)]
pub struct BookingInitiatedResponse {
    pub booking: Booking,
    /// Where the client goes next to pick the slot with the calendar provider.
    pub scheduling_link: String,
}

#[derive(Serialize)]
pub struct SlotsResponse {
    pub provider_id: String,
    pub session_type_id: String,
    pub slots: Vec<Slot>,
}

#[derive(Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
}

impl WebhookAck {
    pub fn applied() -> Self {
        Self { status: "applied" }
    }

    pub fn ignored() -> Self {
        Self { status: "ignored" }
    }
}
