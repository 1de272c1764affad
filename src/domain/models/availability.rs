use serde::{Deserialize, Serialize};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// A recurring weekly opening for a provider. `weekday` is 0 = Monday through
/// 6 = Sunday; times are "HH:MM" wall-clock strings in `timezone`.
#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct AvailabilityRule {
    pub id: String,
    pub provider_id: String,
    pub weekday: i64,
    pub start_time: String,
    pub end_time: String,
    pub timezone: String,
    pub created_at: DateTime<Utc>,
}

impl AvailabilityRule {
    pub fn new(provider_id: String, weekday: i64, start_time: String, end_time: String, timezone: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            provider_id,
            weekday,
            start_time,
            end_time,
            timezone,
            created_at: Utc::now(),
        }
    }
}

/// A date-specific override window. Blocking windows remove rule-derived
/// availability; non-blocking ones open extra time. Blocked wins on overlap.
#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct AvailabilityException {
    pub id: String,
    pub provider_id: String,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub is_blocked: bool,
    pub created_at: DateTime<Utc>,
}

impl AvailabilityException {
    pub fn new(provider_id: String, date: NaiveDate, start_time: String, end_time: String, is_blocked: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            provider_id,
            date,
            start_time,
            end_time,
            is_blocked,
            created_at: Utc::now(),
        }
    }
}
