use crate::domain::models::{
    availability::{AvailabilityException, AvailabilityRule},
    booking::Booking,
    events::Notification,
    session_type::SessionType,
};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

/// Durable storage for bookings; the single source of truth. The only
/// concurrency primitive is `compare_and_swap`; no locks anywhere else.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Persists a new Pending booking. Fails with `DuplicateId` if the id is
    /// taken and `SlotUnavailable` if another active booking already occupies
    /// an overlapping interval for the same provider (checked in the same
    /// transaction, so two racing initiations cannot both succeed).
    async fn create(&self, booking: &Booking) -> Result<Booking, AppError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Booking>, AppError>;
    async fn find_by_manage_token(&self, token: &str) -> Result<Option<Booking>, AppError>;
    /// Writes `booking` only if the stored version equals `expected_version`,
    /// incrementing the version; fails with `VersionConflict` otherwise and
    /// leaves the record unchanged.
    async fn compare_and_swap(&self, expected_version: i64, booking: &Booking) -> Result<Booking, AppError>;
    /// All non-terminal bookings overlapping the window. Pending bookings
    /// count only while their hold is unexpired.
    async fn list_active_for_provider(
        &self,
        provider_id: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Booking>, AppError>;
    async fn list_expired_pending(&self, now: DateTime<Utc>) -> Result<Vec<Booking>, AppError>;
    /// Scheduled bookings untouched since `cutoff`, i.e. whose payment never
    /// arrived within the deadline.
    async fn list_stalled_scheduled(&self, cutoff: DateTime<Utc>) -> Result<Vec<Booking>, AppError>;
    async fn list_elapsed_confirmed(&self, now: DateTime<Utc>) -> Result<Vec<Booking>, AppError>;
}

/// Read surface for the resolver; writes belong to the provider-facing
/// management collaborator and the test harness.
#[async_trait]
pub trait AvailabilityRepository: Send + Sync {
    async fn rules_for_provider(&self, provider_id: &str) -> Result<Vec<AvailabilityRule>, AppError>;
    async fn exceptions_for_range(
        &self,
        provider_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AvailabilityException>, AppError>;
    async fn create_rule(&self, rule: &AvailabilityRule) -> Result<AvailabilityRule, AppError>;
    async fn create_exception(&self, exception: &AvailabilityException) -> Result<AvailabilityException, AppError>;
}

#[async_trait]
pub trait SessionTypeRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<SessionType>, AppError>;
    async fn create(&self, session_type: &SessionType) -> Result<SessionType, AppError>;
}

/// Calendar-scheduling provider, outbound side. The inbound side lives in
/// the webhook normalization code, not behind this trait.
#[async_trait]
pub trait SchedulingGateway: Send + Sync {
    /// Link the client is redirected to; carries the booking id as an opaque
    /// tracking field so the provider's webhooks round-trip it.
    fn build_scheduling_link(&self, booking: &Booking) -> String;
    /// Best-effort cancellation of the provider-side calendar event.
    async fn cancel_event(&self, external_event_ref: &str) -> Result<(), AppError>;
}

/// Payment provider, outbound side.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a checkout session for a paid booking and returns its ref.
    async fn create_checkout_session(&self, booking: &Booking) -> Result<String, AppError>;
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, notification: &Notification) -> Result<(), AppError>;
}
