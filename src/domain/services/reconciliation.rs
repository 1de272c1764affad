use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::models::booking::{Booking, BookingState, FailureReason, PaymentState};
use crate::domain::models::events::{BookingEvent, Notification, PaymentEvent, SchedulingEvent};
use crate::domain::ports::{BookingStore, NotificationDispatcher, PaymentGateway, SchedulingGateway};
use crate::error::AppError;

const MAX_CAS_RETRIES: u32 = 3;

/// Side effect emitted by a transition, executed only after the write
/// succeeded. Releasing a slot needs no instruction: terminal states are
/// excluded by every availability query.
#[derive(Debug, Clone, PartialEq)]
pub enum SideEffect {
    SendConfirmation,
    CreateCheckoutSession,
    NotifyPaymentFailure { reason: String },
    NotifyOperatorOrphanedEvent { external_event_ref: String },
    CancelExternalEvent { external_event_ref: String },
}

/// What `evaluate` decided for one event against one observed booking state.
#[derive(Debug)]
pub enum Decision {
    /// Idempotent replay or irrelevant event; acknowledge without mutation.
    Ignore,
    /// No mutation, but effects still fire (e.g. orphaned-event alert).
    IgnoreWithEffects(Vec<SideEffect>),
    Transition { next: Booking, effects: Vec<SideEffect> },
    Reject(AppError),
}

#[derive(Debug)]
pub enum ReconcileOutcome {
    Applied(Booking),
    NoOp,
    /// Event referenced a booking id we have never seen. Logged and
    /// discarded; a webhook must never fabricate a booking.
    UnknownBooking,
}

/// The state-machine core. All coordination happens through the store's
/// compare-and-swap; there is no other shared state, so concurrent webhook
/// deliveries and client actions interleave safely.
pub struct ReconciliationEngine {
    store: Arc<dyn BookingStore>,
    scheduling: Arc<dyn SchedulingGateway>,
    payments: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn NotificationDispatcher>,
}

impl ReconciliationEngine {
    pub fn new(
        store: Arc<dyn BookingStore>,
        scheduling: Arc<dyn SchedulingGateway>,
        payments: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self { store, scheduling, payments, notifier }
    }

    /// Applies one event. On `VersionConflict` the current state is re-read
    /// and the guard re-evaluated (the event may have become a no-op) rather
    /// than blindly retrying the same mutation.
    pub async fn apply(&self, event: BookingEvent) -> Result<ReconcileOutcome, AppError> {
        let booking_id = event.booking_id().to_string();

        for _attempt in 0..MAX_CAS_RETRIES {
            let Some(current) = self.store.find_by_id(&booking_id).await? else {
                warn!(booking_id = %booking_id, "Event references unknown booking; discarding");
                return Ok(ReconcileOutcome::UnknownBooking);
            };

            match evaluate(&current, &event, Utc::now()) {
                Decision::Ignore => return Ok(ReconcileOutcome::NoOp),
                Decision::IgnoreWithEffects(effects) => {
                    self.run_side_effects(&current, &effects).await?;
                    return Ok(ReconcileOutcome::NoOp);
                }
                Decision::Reject(err) => return Err(err),
                Decision::Transition { next, effects } => {
                    match self.store.compare_and_swap(current.version, &next).await {
                        Ok(stored) => {
                            info!(
                                booking_id = %stored.id,
                                from = ?current.state,
                                to = ?stored.state,
                                "Booking transition applied"
                            );
                            let stored = self.run_side_effects(&stored, &effects).await?;
                            return Ok(ReconcileOutcome::Applied(stored));
                        }
                        Err(AppError::VersionConflict) => continue,
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        Err(AppError::ReconciliationFailed(booking_id))
    }

    /// Runs effects post-write. Notifications are fire-and-forget; checkout
    /// creation is the only effect that mutates the booking again (records
    /// the payment ref via a second compare-and-swap).
    async fn run_side_effects(
        &self,
        booking: &Booking,
        effects: &[SideEffect],
    ) -> Result<Booking, AppError> {
        let mut booking = booking.clone();

        for effect in effects {
            match effect {
                SideEffect::SendConfirmation => {
                    self.notify(&Notification::SendConfirmation { booking_id: booking.id.clone() })
                        .await;
                }
                SideEffect::NotifyPaymentFailure { reason } => {
                    self.notify(&Notification::NotifyPaymentFailure {
                        booking_id: booking.id.clone(),
                        reason: reason.clone(),
                    })
                    .await;
                }
                SideEffect::NotifyOperatorOrphanedEvent { external_event_ref } => {
                    self.notify(&Notification::NotifyOperatorOrphanedEvent {
                        booking_id: booking.id.clone(),
                        external_event_ref: external_event_ref.clone(),
                    })
                    .await;
                }
                SideEffect::CancelExternalEvent { external_event_ref } => {
                    // Best effort: the booking is already cancelled locally.
                    if let Err(e) = self.scheduling.cancel_event(external_event_ref).await {
                        warn!(
                            booking_id = %booking.id,
                            external_event_ref = %external_event_ref,
                            "Failed to cancel external calendar event: {}", e
                        );
                    }
                }
                SideEffect::CreateCheckoutSession => {
                    let payment_ref = self.payments.create_checkout_session(&booking).await?;
                    booking = self.record_payment_ref(booking, payment_ref).await?;
                }
            }
        }

        Ok(booking)
    }

    async fn notify(&self, notification: &Notification) {
        if let Err(e) = self.notifier.dispatch(notification).await {
            warn!("Notification dispatch failed (not retried): {}", e);
        }
    }

    async fn record_payment_ref(
        &self,
        booking: Booking,
        payment_ref: String,
    ) -> Result<Booking, AppError> {
        let mut current = booking;

        for _attempt in 0..MAX_CAS_RETRIES {
            if current.payment_ref.is_some() || current.state != BookingState::Scheduled {
                return Ok(current);
            }

            let mut next = current.clone();
            next.payment_ref = Some(payment_ref.clone());
            next.updated_at = Utc::now();

            match self.store.compare_and_swap(current.version, &next).await {
                Ok(stored) => return Ok(stored),
                Err(AppError::VersionConflict) => {
                    current = self
                        .store
                        .find_by_id(&next.id)
                        .await?
                        .ok_or_else(|| AppError::NotFound(format!("Booking {}", next.id)))?;
                }
                Err(e) => return Err(e),
            }
        }

        Err(AppError::ReconciliationFailed(current.id))
    }
}

/// The guard table of §state machine, written as a pure function so every
/// branch is unit-testable. Safe under arbitrary interleaving: each arm
/// either produces a transition conditioned on the observed version or an
/// idempotent no-op.
pub fn evaluate(current: &Booking, event: &BookingEvent, now: DateTime<Utc>) -> Decision {
    match event {
        BookingEvent::Scheduling(SchedulingEvent::EventCreated {
            start,
            end,
            external_event_ref,
            ..
        }) => match current.state {
            BookingState::Pending => {
                if now >= current.hold_expires_at {
                    // The hold ran out; the sweep owns this booking now. A
                    // racing confirmation loses and the operator gets told.
                    return Decision::IgnoreWithEffects(vec![
                        SideEffect::NotifyOperatorOrphanedEvent {
                            external_event_ref: external_event_ref.clone(),
                        },
                    ]);
                }
                let mut next = current.clone();
                next.scheduled_start = Some(*start);
                next.scheduled_end = Some(*end);
                next.external_event_ref = Some(external_event_ref.clone());
                next.updated_at = now;

                let effects = if current.is_free_session {
                    next.state = BookingState::Confirmed;
                    vec![SideEffect::SendConfirmation]
                } else {
                    next.state = BookingState::Scheduled;
                    vec![SideEffect::CreateCheckoutSession]
                };
                Decision::Transition { next, effects }
            }
            // Redelivery after checkout creation failed with a 5xx: retry
            // the checkout instead of dropping the paid flow on the floor.
            BookingState::Scheduled
                if !current.is_free_session && current.payment_ref.is_none() =>
            {
                Decision::IgnoreWithEffects(vec![SideEffect::CreateCheckoutSession])
            }
            BookingState::Failed
                if current.failure_reason == Some(FailureReason::SchedulingTimeout) =>
            {
                Decision::IgnoreWithEffects(vec![SideEffect::NotifyOperatorOrphanedEvent {
                    external_event_ref: external_event_ref.clone(),
                }])
            }
            _ => Decision::Ignore,
        },

        BookingEvent::Scheduling(SchedulingEvent::EventCancelled { .. }) => {
            if current.is_terminal() {
                return Decision::Ignore;
            }
            let mut next = current.clone();
            next.state = BookingState::Cancelled;
            next.updated_at = now;
            // The calendar event is already gone provider-side.
            Decision::Transition { next, effects: vec![] }
        }

        BookingEvent::Payment(PaymentEvent::PaymentSucceeded { payment_ref, .. }) => {
            match current.state {
                BookingState::Scheduled => {
                    if let Some(existing) = &current.payment_ref
                        && existing != payment_ref
                    {
                        warn!(
                            booking_id = %current.id,
                            "Payment success for mismatched payment ref; discarding"
                        );
                        return Decision::Ignore;
                    }
                    let mut next = current.clone();
                    next.state = BookingState::Confirmed;
                    next.payment_ref = Some(payment_ref.clone());
                    next.payment_state = Some(PaymentState::Succeeded);
                    next.updated_at = now;
                    Decision::Transition { next, effects: vec![SideEffect::SendConfirmation] }
                }
                _ => Decision::Ignore,
            }
        }

        BookingEvent::Payment(PaymentEvent::PaymentFailed { reason, .. }) => {
            match current.state {
                BookingState::Scheduled => {
                    let mut next = current.clone();
                    next.state = BookingState::Failed;
                    next.payment_state = Some(PaymentState::Failed);
                    next.failure_reason = Some(FailureReason::PaymentFailed);
                    next.updated_at = now;
                    Decision::Transition {
                        next,
                        effects: vec![SideEffect::NotifyPaymentFailure { reason: reason.clone() }],
                    }
                }
                _ => Decision::Ignore,
            }
        }

        BookingEvent::CancellationRequested { .. } => match current.state {
            BookingState::Pending | BookingState::Scheduled => {
                let mut next = current.clone();
                next.state = BookingState::Cancelled;
                next.updated_at = now;
                let effects = match &current.external_event_ref {
                    Some(event_ref) => vec![SideEffect::CancelExternalEvent {
                        external_event_ref: event_ref.clone(),
                    }],
                    None => vec![],
                };
                Decision::Transition { next, effects }
            }
            BookingState::Cancelled => Decision::Ignore,
            _ => Decision::Reject(AppError::InvalidTransition(
                "Booking can no longer be cancelled".into(),
            )),
        },

        BookingEvent::HoldExpired { .. } => {
            if current.hold_expired(now) {
                let mut next = current.clone();
                next.state = BookingState::Failed;
                next.failure_reason = Some(FailureReason::SchedulingTimeout);
                next.updated_at = now;
                Decision::Transition { next, effects: vec![] }
            } else {
                Decision::Ignore
            }
        }

        BookingEvent::PaymentOverdue { .. } => {
            // The sweep pre-filters by deadline; a payment that raced in
            // moved the booking off Scheduled and wins on the re-read.
            if current.state == BookingState::Scheduled {
                let mut next = current.clone();
                next.state = BookingState::Failed;
                next.failure_reason = Some(FailureReason::PaymentTimeout);
                next.updated_at = now;
                let mut effects = vec![SideEffect::NotifyPaymentFailure {
                    reason: "payment_deadline_expired".to_string(),
                }];
                if let Some(event_ref) = &current.external_event_ref {
                    effects.push(SideEffect::CancelExternalEvent {
                        external_event_ref: event_ref.clone(),
                    });
                }
                Decision::Transition { next, effects }
            } else {
                Decision::Ignore
            }
        }

        BookingEvent::SessionElapsed { .. } => {
            let elapsed = current.state == BookingState::Confirmed
                && current.scheduled_end.is_some_and(|end| end <= now);
            if elapsed {
                let mut next = current.clone();
                next.state = BookingState::Completed;
                next.updated_at = now;
                Decision::Transition { next, effects: vec![] }
            } else {
                Decision::Ignore
            }
        }
    }
}
