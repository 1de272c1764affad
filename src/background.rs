use std::sync::Arc;
use std::time::Duration;
use chrono::Utc;
use tokio::time::sleep;
use tracing::{error, info, info_span, Instrument};

use crate::domain::models::events::BookingEvent;
use crate::error::AppError;
use crate::state::AppState;

/// Time-based sweep: fails Pending bookings whose hold expired without the
/// external scheduling step completing, fails Scheduled bookings whose
/// payment never arrived within the deadline, and completes Confirmed
/// bookings whose session time has passed. Each expiry goes through the
/// engine like any other event, so it obeys the same compare-and-swap
/// discipline.
pub async fn start_sweep_worker(state: Arc<AppState>) {
    info!("Starting booking sweep worker...");

    loop {
        if let Err(e) = run_sweep_once(&state).await {
            error!("Sweep pass failed: {:?}", e);
        }
        sleep(Duration::from_secs(state.config.sweep_interval_secs)).await;
    }
}

pub async fn run_sweep_once(state: &Arc<AppState>) -> Result<(), AppError> {
    let now = Utc::now();

    for booking in state.booking_store.list_expired_pending(now).await? {
        let booking_id = booking.id.clone();
        let span = info_span!("sweep_hold_expired", booking_id = %booking_id);
        async {
            info!("Failing booking: scheduling hold expired");
            if let Err(e) = state
                .engine
                .apply(BookingEvent::HoldExpired { booking_id: booking_id.clone() })
                .await
            {
                error!("Failed to expire booking hold: {:?}", e);
            }
        }
        .instrument(span)
        .await;
    }

    let payment_cutoff =
        now - chrono::Duration::minutes(state.config.scheduled_payment_deadline_minutes);
    for booking in state.booking_store.list_stalled_scheduled(payment_cutoff).await? {
        let booking_id = booking.id.clone();
        let span = info_span!("sweep_payment_overdue", booking_id = %booking_id);
        async {
            info!("Failing booking: payment deadline expired");
            if let Err(e) = state
                .engine
                .apply(BookingEvent::PaymentOverdue { booking_id: booking_id.clone() })
                .await
            {
                error!("Failed to expire overdue payment: {:?}", e);
            }
        }
        .instrument(span)
        .await;
    }

    for booking in state.booking_store.list_elapsed_confirmed(now).await? {
        let booking_id = booking.id.clone();
        let span = info_span!("sweep_session_elapsed", booking_id = %booking_id);
        async {
            if let Err(e) = state
                .engine
                .apply(BookingEvent::SessionElapsed { booking_id: booking_id.clone() })
                .await
            {
                error!("Failed to complete elapsed booking: {:?}", e);
            }
        }
        .instrument(span)
        .await;
    }

    Ok(())
}
