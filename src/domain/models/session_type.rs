use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// A bookable offering. A missing or zero price means the session is free and
/// therefore bookable anonymously.
#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct SessionType {
    pub id: String,
    pub provider_id: String,
    pub duration_minutes: i64,
    pub price_cents: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl SessionType {
    pub fn new(provider_id: String, duration_minutes: i64, price_cents: Option<i64>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            provider_id,
            duration_minutes,
            price_cents,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    pub fn is_free(&self) -> bool {
        self.price_cents.unwrap_or(0) == 0
    }
}
