use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

#[derive(Deserialize)]
pub struct InitiateBookingRequest {
    pub provider_id: String,
    pub session_type_id: String,
    /// Requested slot start, RFC 3339 UTC.
    pub start: DateTime<Utc>,
    pub client_id: Option<String>,
}

#[derive(Deserialize)]
pub struct SlotsQuery {
    pub session_type_id: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
}
