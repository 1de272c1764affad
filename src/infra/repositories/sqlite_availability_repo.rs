use crate::domain::models::availability::{AvailabilityException, AvailabilityRule};
use crate::domain::ports::AvailabilityRepository;
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Timelike};
use sqlx::SqlitePool;

pub struct SqliteAvailabilityRepo {
    pool: SqlitePool,
}

impl SqliteAvailabilityRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

// Mirrors the resolver's window grammar: "24:00" is a valid end marker
// meaning end of day.
fn validate_window(start: &str, end: &str) -> Result<(), AppError> {
    let s = NaiveTime::parse_from_str(start, "%H:%M")
        .map_err(|_| AppError::Validation(format!("Invalid start time: {}", start)))?;
    let end_minutes = if end == "24:00" {
        24 * 60
    } else {
        let e = NaiveTime::parse_from_str(end, "%H:%M")
            .map_err(|_| AppError::Validation(format!("Invalid end time: {}", end)))?;
        (e.hour() * 60 + e.minute()) as i64
    };
    if (s.hour() * 60 + s.minute()) as i64 >= end_minutes {
        return Err(AppError::Validation(format!(
            "Window {}-{} is empty or inverted",
            start, end
        )));
    }
    Ok(())
}

#[async_trait]
impl AvailabilityRepository for SqliteAvailabilityRepo {
    async fn rules_for_provider(&self, provider_id: &str) -> Result<Vec<AvailabilityRule>, AppError> {
        sqlx::query_as::<_, AvailabilityRule>(
            "SELECT * FROM availability_rules WHERE provider_id = ? ORDER BY weekday, start_time",
        )
            .bind(provider_id)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn exceptions_for_range(
        &self,
        provider_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AvailabilityException>, AppError> {
        sqlx::query_as::<_, AvailabilityException>(
            "SELECT * FROM availability_exceptions WHERE provider_id = ? AND date >= ? AND date <= ?",
        )
            .bind(provider_id)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn create_rule(&self, rule: &AvailabilityRule) -> Result<AvailabilityRule, AppError> {
        validate_window(&rule.start_time, &rule.end_time)?;
        if !(0..=6).contains(&rule.weekday) {
            return Err(AppError::Validation("Weekday must be 0 (Mon) through 6 (Sun)".into()));
        }
        rule.timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|_| AppError::Validation(format!("Invalid timezone: {}", rule.timezone)))?;

        // All of a provider's rules must share one timezone; the resolver
        // runs its grid in that zone.
        let existing = self.rules_for_provider(&rule.provider_id).await?;
        if let Some(first) = existing.first()
            && first.timezone != rule.timezone
        {
            return Err(AppError::Validation(
                "Rule timezone differs from the provider's existing rules".into(),
            ));
        }

        sqlx::query_as::<_, AvailabilityRule>(
            "INSERT INTO availability_rules (id, provider_id, weekday, start_time, end_time, timezone, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING *",
        )
            .bind(&rule.id).bind(&rule.provider_id).bind(rule.weekday)
            .bind(&rule.start_time).bind(&rule.end_time).bind(&rule.timezone)
            .bind(rule.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn create_exception(
        &self,
        exception: &AvailabilityException,
    ) -> Result<AvailabilityException, AppError> {
        validate_window(&exception.start_time, &exception.end_time)?;

        sqlx::query_as::<_, AvailabilityException>(
            "INSERT INTO availability_exceptions (id, provider_id, date, start_time, end_time, is_blocked, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING *",
        )
            .bind(&exception.id).bind(&exception.provider_id).bind(exception.date)
            .bind(&exception.start_time).bind(&exception.end_time).bind(exception.is_blocked)
            .bind(exception.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)
    }
}
