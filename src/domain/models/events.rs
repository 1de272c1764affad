use chrono::{DateTime, Utc};
use serde::Serialize;

/// Normalized calendar-provider event, produced by the scheduling gateway
/// after signature verification. The engine never sees raw provider shapes.
#[derive(Debug, Clone)]
pub enum SchedulingEvent {
    EventCreated {
        booking_id: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        external_event_ref: String,
    },
    EventCancelled {
        booking_id: String,
        external_event_ref: String,
    },
}

/// Normalized payment-provider event.
#[derive(Debug, Clone)]
pub enum PaymentEvent {
    PaymentSucceeded {
        booking_id: String,
        payment_ref: String,
    },
    PaymentFailed {
        booking_id: String,
        payment_ref: String,
        reason: String,
    },
}

/// Everything the reconciliation engine consumes: webhook events, direct
/// client actions and sweep-generated timeouts all go through the same state
/// machine.
#[derive(Debug, Clone)]
pub enum BookingEvent {
    Scheduling(SchedulingEvent),
    Payment(PaymentEvent),
    CancellationRequested { booking_id: String },
    HoldExpired { booking_id: String },
    PaymentOverdue { booking_id: String },
    SessionElapsed { booking_id: String },
}

impl BookingEvent {
    pub fn booking_id(&self) -> &str {
        match self {
            BookingEvent::Scheduling(SchedulingEvent::EventCreated { booking_id, .. })
            | BookingEvent::Scheduling(SchedulingEvent::EventCancelled { booking_id, .. })
            | BookingEvent::Payment(PaymentEvent::PaymentSucceeded { booking_id, .. })
            | BookingEvent::Payment(PaymentEvent::PaymentFailed { booking_id, .. })
            | BookingEvent::CancellationRequested { booking_id }
            | BookingEvent::HoldExpired { booking_id }
            | BookingEvent::PaymentOverdue { booking_id }
            | BookingEvent::SessionElapsed { booking_id } => booking_id,
        }
    }
}

/// Fire-and-forget instruction for the notification dispatcher. The core does
/// not block on or retry these.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    SendConfirmation { booking_id: String },
    NotifyPaymentFailure { booking_id: String, reason: String },
    NotifyOperatorOrphanedEvent { booking_id: String, external_event_ref: String },
}
