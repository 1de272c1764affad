use crate::domain::models::booking::Booking;
use crate::domain::ports::BookingStore;
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

pub struct SqliteBookingStore {
    pool: SqlitePool,
}

impl SqliteBookingStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

// Non-terminal states; Pending only counts while its hold is unexpired.
const ACTIVE_OVERLAP_SQL: &str = "SELECT COUNT(*) as count FROM bookings \
     WHERE provider_id = ? \
       AND state IN ('PENDING', 'SCHEDULED', 'CONFIRMED') \
       AND (state != 'PENDING' OR hold_expires_at > ?) \
       AND COALESCE(scheduled_start, requested_start) < ? \
       AND COALESCE(scheduled_end, requested_end) > ?";

#[async_trait]
impl BookingStore for SqliteBookingStore {
    async fn create(&self, booking: &Booking) -> Result<Booking, AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        if sqlx::query("SELECT id FROM bookings WHERE id = ?")
            .bind(&booking.id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(AppError::Database)?
            .is_some()
        {
            return Err(AppError::DuplicateId(booking.id.clone()));
        }

        let overlap = sqlx::query(ACTIVE_OVERLAP_SQL)
            .bind(&booking.provider_id)
            .bind(Utc::now())
            .bind(booking.requested_end)
            .bind(booking.requested_start)
            .fetch_one(&mut *tx)
            .await
            .map_err(AppError::Database)?;
        if overlap.get::<i64, _>("count") > 0 {
            return Err(AppError::SlotUnavailable);
        }

        let created = sqlx::query_as::<_, Booking>(
            "INSERT INTO bookings (id, provider_id, client_id, session_type_id, is_free_session, state, \
                requested_start, requested_end, scheduled_start, scheduled_end, external_event_ref, \
                payment_ref, payment_state, failure_reason, manage_token, hold_expires_at, version, \
                created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING *"
        )
            .bind(&booking.id).bind(&booking.provider_id).bind(&booking.client_id)
            .bind(&booking.session_type_id).bind(booking.is_free_session).bind(booking.state)
            .bind(booking.requested_start).bind(booking.requested_end)
            .bind(booking.scheduled_start).bind(booking.scheduled_end)
            .bind(&booking.external_event_ref).bind(&booking.payment_ref)
            .bind(booking.payment_state).bind(booking.failure_reason)
            .bind(&booking.manage_token).bind(booking.hold_expires_at).bind(booking.version)
            .bind(booking.created_at).bind(booking.updated_at)
            .fetch_one(&mut *tx).await.map_err(AppError::Database)?;

        tx.commit().await.map_err(AppError::Database)?;
        Ok(created)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Booking>, AppError> {
        sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn find_by_manage_token(&self, token: &str) -> Result<Option<Booking>, AppError> {
        sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE manage_token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn compare_and_swap(
        &self,
        expected_version: i64,
        booking: &Booking,
    ) -> Result<Booking, AppError> {
        // The version predicate makes this the single concurrency-control
        // primitive: at most one write can succeed per version number.
        let updated = sqlx::query_as::<_, Booking>(
            "UPDATE bookings SET state = ?, scheduled_start = ?, scheduled_end = ?, \
                external_event_ref = ?, payment_ref = ?, payment_state = ?, failure_reason = ?, \
                hold_expires_at = ?, updated_at = ?, version = version + 1
             WHERE id = ? AND version = ?
             RETURNING *"
        )
            .bind(booking.state).bind(booking.scheduled_start).bind(booking.scheduled_end)
            .bind(&booking.external_event_ref).bind(&booking.payment_ref)
            .bind(booking.payment_state).bind(booking.failure_reason)
            .bind(booking.hold_expires_at).bind(booking.updated_at)
            .bind(&booking.id).bind(expected_version)
            .fetch_optional(&self.pool).await.map_err(AppError::Database)?;

        updated.ok_or(AppError::VersionConflict)
    }

    async fn list_active_for_provider(
        &self,
        provider_id: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Booking>, AppError> {
        sqlx::query_as::<_, Booking>(
            "SELECT * FROM bookings \
             WHERE provider_id = ? \
               AND state IN ('PENDING', 'SCHEDULED', 'CONFIRMED') \
               AND (state != 'PENDING' OR hold_expires_at > ?) \
               AND COALESCE(scheduled_start, requested_start) < ? \
               AND COALESCE(scheduled_end, requested_end) > ?",
        )
            .bind(provider_id)
            .bind(now)
            .bind(window_end)
            .bind(window_start)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn list_expired_pending(&self, now: DateTime<Utc>) -> Result<Vec<Booking>, AppError> {
        sqlx::query_as::<_, Booking>(
            "SELECT * FROM bookings WHERE state = 'PENDING' AND hold_expires_at <= ?",
        )
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn list_stalled_scheduled(&self, cutoff: DateTime<Utc>) -> Result<Vec<Booking>, AppError> {
        sqlx::query_as::<_, Booking>(
            "SELECT * FROM bookings WHERE state = 'SCHEDULED' AND updated_at <= ?",
        )
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn list_elapsed_confirmed(&self, now: DateTime<Utc>) -> Result<Vec<Booking>, AppError> {
        sqlx::query_as::<_, Booking>(
            "SELECT * FROM bookings \
             WHERE state = 'CONFIRMED' AND scheduled_end IS NOT NULL AND scheduled_end <= ?",
        )
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }
}
