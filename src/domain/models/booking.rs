use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;
use rand::{distributions::Alphanumeric, Rng};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingState {
    Pending,
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentState {
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    SchedulingTimeout,
    PaymentFailed,
    PaymentTimeout,
}

/// The central entity: one record per booking attempt, reconciled from the
/// client request, the scheduling provider's webhooks and the payment
/// provider's webhooks. `version` is the optimistic-concurrency token; every
/// write goes through the store's compare-and-swap.
#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Booking {
    pub id: String,
    pub provider_id: String,
    /// None signifies an anonymous booker; only allowed for free sessions.
    pub client_id: Option<String>,
    pub session_type_id: String,
    pub is_free_session: bool,
    pub state: BookingState,
    pub requested_start: DateTime<Utc>,
    pub requested_end: DateTime<Utc>,
    pub scheduled_start: Option<DateTime<Utc>>,
    pub scheduled_end: Option<DateTime<Utc>>,
    pub external_event_ref: Option<String>,
    pub payment_ref: Option<String>,
    pub payment_state: Option<PaymentState>,
    pub failure_reason: Option<FailureReason>,
    pub manage_token: String,
    pub hold_expires_at: DateTime<Utc>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct NewBookingParams {
    pub provider_id: String,
    pub client_id: Option<String>,
    pub session_type_id: String,
    pub is_free_session: bool,
    pub start: DateTime<Utc>,
    pub duration_min: i64,
    pub hold_minutes: i64,
}

impl Booking {
    pub fn new(params: NewBookingParams) -> Self {
        let requested_end = params.start + Duration::minutes(params.duration_min);

        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(48)
            .map(char::from)
            .collect();

        let now = Utc::now();

        Self {
            id: Uuid::new_v4().to_string(),
            provider_id: params.provider_id,
            client_id: params.client_id,
            session_type_id: params.session_type_id,
            is_free_session: params.is_free_session,
            state: BookingState::Pending,
            requested_start: params.start,
            requested_end,
            scheduled_start: None,
            scheduled_end: None,
            external_event_ref: None,
            payment_ref: None,
            payment_state: None,
            failure_reason: None,
            manage_token: token,
            hold_expires_at: now + Duration::minutes(params.hold_minutes),
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Terminal bookings are immutable; later webhook events are acknowledged
    /// idempotently without mutation. Confirmed is terminal for free sessions
    /// only (a paid Confirmed booking can still be cancelled calendar-side).
    pub fn is_terminal(&self) -> bool {
        match self.state {
            BookingState::Completed | BookingState::Cancelled | BookingState::Failed => true,
            BookingState::Confirmed => self.is_free_session,
            _ => false,
        }
    }

    pub fn hold_expired(&self, now: DateTime<Utc>) -> bool {
        self.state == BookingState::Pending && now >= self.hold_expires_at
    }

    /// The interval this booking occupies from the availability resolver's
    /// point of view: the calendar event once it exists, the requested slot
    /// while still Pending.
    pub fn occupied_interval(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        match (self.scheduled_start, self.scheduled_end) {
            (Some(s), Some(e)) => (s, e),
            _ => (self.requested_start, self.requested_end),
        }
    }
}
