use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::cmp::{max, min};
use std::sync::Arc;
use tracing::warn;

use crate::domain::models::availability::{AvailabilityException, AvailabilityRule};
use crate::domain::models::booking::Booking;
use crate::domain::models::session_type::SessionType;
use crate::domain::ports::{AvailabilityRepository, BookingStore, SessionTypeRepository};
use crate::error::AppError;

const MAX_RANGE_DAYS: i64 = 62;

const TOTAL_MINUTES: usize = 1440;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Slot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Computes the bookable slots for one provider-local date.
///
/// All interval arithmetic happens on a minute grid in the provider's local
/// calendar time; conversion to UTC is the last step, so a nominal 09:00-17:00
/// rule means local 9-5 regardless of DST. Open windows come from the weekday
/// rules plus non-blocking exceptions; blocking exceptions then clear minutes;
/// finally the intervals occupied by existing non-terminal bookings are
/// removed and start-aligned slots of exactly `duration_min` are emitted in
/// ascending order.
pub fn calculate_slots(
    rules: &[AvailabilityRule],
    exceptions: &[AvailabilityException],
    duration_min: i64,
    date: NaiveDate,
    existing_bookings: &[Booking],
    now: DateTime<Utc>,
) -> Result<Vec<Slot>, AppError> {
    if duration_min <= 0 {
        return Err(AppError::Validation("Session duration must be positive".into()));
    }
    let duration = duration_min as usize;

    let tz: Tz = rules
        .first()
        .map(|r| r.timezone.parse().unwrap_or(chrono_tz::UTC))
        .unwrap_or(chrono_tz::UTC);

    let mut open = [false; TOTAL_MINUTES];

    let weekday = date.weekday().num_days_from_monday() as i64;
    for rule in rules.iter().filter(|r| r.weekday == weekday) {
        match parse_window(&rule.start_time, &rule.end_time) {
            Ok((s, e)) => {
                for minute in &mut open[s..e] {
                    *minute = true;
                }
            }
            Err(_) => {
                warn!("Skipping malformed availability rule {}", rule.id);
            }
        }
    }

    // Extra openings first, then blocks: a blocking exception always wins for
    // the minutes it covers.
    let todays: Vec<&AvailabilityException> =
        exceptions.iter().filter(|x| x.date == date).collect();
    for exc in todays.iter().filter(|x| !x.is_blocked) {
        let (s, e) = parse_window(&exc.start_time, &exc.end_time)?;
        for minute in &mut open[s..e] {
            *minute = true;
        }
    }
    for exc in todays.iter().filter(|x| x.is_blocked) {
        let (s, e) = parse_window(&exc.start_time, &exc.end_time)?;
        for minute in &mut open[s..e] {
            *minute = false;
        }
    }

    let Some(day_start_local) = tz.from_local_datetime(&date.and_hms_opt(0, 0, 0).unwrap()).earliest() else {
        return Ok(Vec::new());
    };
    let day_start_utc = day_start_local.with_timezone(&Utc);
    let day_end_utc = day_start_utc + Duration::minutes(TOTAL_MINUTES as i64 + 120);

    for booking in existing_bookings {
        let (b_start, b_end) = booking.occupied_interval();
        let b_start = max(b_start, day_start_utc);
        let b_end = min(b_end, day_end_utc);
        if b_start >= b_end {
            continue;
        }

        let start_diff = (b_start.timestamp() - day_start_utc.timestamp()) / 60;
        let end_diff = (b_end.timestamp() - day_start_utc.timestamp() + 59) / 60;

        let s_idx = max(0, min(start_diff, TOTAL_MINUTES as i64)) as usize;
        let e_idx = max(0, min(end_diff, TOTAL_MINUTES as i64)) as usize;

        for minute in &mut open[s_idx..e_idx] {
            *minute = false;
        }
    }

    let mut slots = Vec::new();
    let mut cursor = 0usize;
    while cursor < TOTAL_MINUTES {
        if !open[cursor] {
            cursor += 1;
            continue;
        }
        let run_start = cursor;
        while cursor < TOTAL_MINUTES && open[cursor] {
            cursor += 1;
        }
        let run_end = cursor;

        let mut slot_idx = run_start;
        while slot_idx + duration <= run_end {
            let hour = (slot_idx / 60) as u32;
            let minute = (slot_idx % 60) as u32;
            if let Some(nt) = NaiveTime::from_hms_opt(hour, minute, 0)
                && let Some(local) = tz.from_local_datetime(&date.and_time(nt)).single()
            {
                let start_utc = local.with_timezone(&Utc);
                let end_utc = start_utc + Duration::minutes(duration_min);
                if start_utc >= now {
                    slots.push(Slot { start: start_utc, end: end_utc });
                }
            }
            slot_idx += duration;
        }
    }

    Ok(slots)
}

/// Parses an "HH:MM"/"HH:MM" window into grid indices. The end time "24:00"
/// denotes end of day (grid index 1440); a "23:59" end stops at minute 1439
/// like any other time. Zero-length or inverted windows are rejected, not
/// silently dropped.
fn parse_window(start: &str, end: &str) -> Result<(usize, usize), AppError> {
    let s = NaiveTime::parse_from_str(start, "%H:%M")
        .map_err(|_| AppError::Validation(format!("Invalid window start time: {}", start)))?;
    let s_idx = (s.hour() * 60 + s.minute()) as usize;

    let e_idx = if end == "24:00" {
        TOTAL_MINUTES
    } else {
        let e = NaiveTime::parse_from_str(end, "%H:%M")
            .map_err(|_| AppError::Validation(format!("Invalid window end time: {}", end)))?;
        (e.hour() * 60 + e.minute()) as usize
    };

    if s_idx >= e_idx {
        return Err(AppError::Validation(format!(
            "Window {}-{} is empty or inverted",
            start, end
        )));
    }
    Ok((s_idx, e_idx))
}

/// Read-side surface over the resolver: loads the provider's rules,
/// exceptions and active bookings and runs `calculate_slots` per date. Never
/// writes, so callers may retry freely.
pub struct AvailabilityService {
    bookings: Arc<dyn BookingStore>,
    availability: Arc<dyn AvailabilityRepository>,
    session_types: Arc<dyn SessionTypeRepository>,
}

impl AvailabilityService {
    pub fn new(
        bookings: Arc<dyn BookingStore>,
        availability: Arc<dyn AvailabilityRepository>,
        session_types: Arc<dyn SessionTypeRepository>,
    ) -> Self {
        Self { bookings, availability, session_types }
    }

    pub async fn session_type(&self, id: &str) -> Result<SessionType, AppError> {
        let session_type = self
            .session_types
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Validation(format!("Unknown session type: {}", id)))?;
        if !session_type.is_active {
            return Err(AppError::Validation("Session type is inactive".into()));
        }
        Ok(session_type)
    }

    pub async fn slots_for_range(
        &self,
        provider_id: &str,
        session_type_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Slot>, AppError> {
        if to < from {
            return Err(AppError::Validation("Date range is inverted".into()));
        }
        if (to - from).num_days() > MAX_RANGE_DAYS {
            return Err(AppError::Validation(format!(
                "Date range exceeds {} days",
                MAX_RANGE_DAYS
            )));
        }

        let session_type = self.session_type(session_type_id).await?;
        if session_type.provider_id != provider_id {
            return Err(AppError::Validation(
                "Session type does not belong to this provider".into(),
            ));
        }

        let rules = self.availability.rules_for_provider(provider_id).await?;
        if rules.is_empty() {
            return Err(AppError::Validation(format!(
                "Unknown provider or no availability configured: {}",
                provider_id
            )));
        }
        let exceptions = self
            .availability
            .exceptions_for_range(provider_id, from, to)
            .await?;

        let now = Utc::now();
        let mut slots = Vec::new();
        let mut date = from;
        while date <= to {
            // Window padded a day each side so timezone offsets cannot hide
            // an overlapping booking.
            let window_start = DateTime::<Utc>::from_naive_utc_and_offset(
                (date - Duration::days(1)).and_hms_opt(0, 0, 0).unwrap(),
                Utc,
            );
            let window_end = window_start + Duration::days(3);
            let active = self
                .bookings
                .list_active_for_provider(provider_id, window_start, window_end, now)
                .await?;

            slots.extend(calculate_slots(
                &rules,
                &exceptions,
                session_type.duration_minutes,
                date,
                &active,
                now,
            )?);
            date += Duration::days(1);
        }

        Ok(slots)
    }

    /// Whether `start` is currently an offerable slot for the session type.
    /// Checks the surrounding local dates so a UTC instant near midnight is
    /// found regardless of the provider's timezone.
    pub async fn is_slot_open(
        &self,
        provider_id: &str,
        session_type: &SessionType,
        start: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let date = start.date_naive();
        let slots = self
            .slots_for_range(
                provider_id,
                &session_type.id,
                date - Duration::days(1),
                date + Duration::days(1),
            )
            .await?;
        Ok(slots.iter().any(|s| s.start == start))
    }
}
