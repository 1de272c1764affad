use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

use crate::domain::models::booking::{Booking, NewBookingParams};
use crate::domain::ports::{BookingStore, SchedulingGateway};
use crate::domain::services::availability::AvailabilityService;
use crate::error::AppError;

pub struct InitiateRequest {
    pub provider_id: String,
    pub session_type_id: String,
    pub start: DateTime<Utc>,
    /// None marks an anonymous booker, as supplied by the authentication
    /// collaborator; the core trusts it as already verified.
    pub client_id: Option<String>,
}

/// The only entry point that creates a Booking; every other actor merely
/// transitions an existing one through the reconciliation engine.
pub struct InitiationService {
    store: Arc<dyn BookingStore>,
    availability: Arc<AvailabilityService>,
    scheduling: Arc<dyn SchedulingGateway>,
    hold_minutes: i64,
}

impl InitiationService {
    pub fn new(
        store: Arc<dyn BookingStore>,
        availability: Arc<AvailabilityService>,
        scheduling: Arc<dyn SchedulingGateway>,
        hold_minutes: i64,
    ) -> Self {
        Self { store, availability, scheduling, hold_minutes }
    }

    /// Creates a Pending booking and returns it together with the external
    /// scheduling link the client is redirected to. The booking id is
    /// generated here and threaded through the link as correlation token.
    pub async fn initiate(&self, req: InitiateRequest) -> Result<(Booking, String), AppError> {
        let session_type = self.availability.session_type(&req.session_type_id).await?;
        if session_type.provider_id != req.provider_id {
            return Err(AppError::Validation(
                "Session type does not belong to this provider".into(),
            ));
        }

        if req.client_id.is_none() && !session_type.is_free() {
            return Err(AppError::AuthenticationRequired);
        }

        if req.start <= Utc::now() {
            return Err(AppError::Validation("Requested slot is in the past".into()));
        }

        if !self
            .availability
            .is_slot_open(&req.provider_id, &session_type, req.start)
            .await?
        {
            return Err(AppError::SlotUnavailable);
        }

        let booking = Booking::new(NewBookingParams {
            provider_id: req.provider_id,
            client_id: req.client_id,
            session_type_id: session_type.id.clone(),
            is_free_session: session_type.is_free(),
            start: req.start,
            duration_min: session_type.duration_minutes,
            hold_minutes: self.hold_minutes,
        });

        // The store re-checks overlap transactionally, so two racing
        // initiations for the same slot cannot both land.
        let created = self.store.create(&booking).await?;
        let link = self.scheduling.build_scheduling_link(&created);

        info!(
            booking_id = %created.id,
            provider_id = %created.provider_id,
            anonymous = created.client_id.is_none(),
            "Booking initiated"
        );

        Ok((created, link))
    }
}
