//! Time normalization -- `"HH:MM"` strings into comparable instants.
//!
//! Every time-of-day is anchored to the same reference date so two normalized
//! values compare correctly no matter which calendar day the caller had in mind.
//! Slot queries later move the time-of-day onto the requested date with
//! [`reanchor`].

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};

use crate::error::{AvailabilityError, Result};

/// The calendar date all normalized times live on (2000-01-01, UTC).
pub const REFERENCE_DATE: NaiveDate = match NaiveDate::from_ymd_opt(2000, 1, 1) {
    Some(date) => date,
    None => panic!("reference date is valid"),
};

/// Parse an `"HH:MM"` time-of-day into an instant on [`REFERENCE_DATE`].
///
/// Hours must be 0-23 and minutes 0-59. Each field is one or two ASCII digits;
/// signs, whitespace, seconds and extra separators are rejected.
///
/// # Errors
/// Returns `AvailabilityError::InvalidTimeFormat` for any malformed input.
pub fn normalize_time(input: &str) -> Result<DateTime<Utc>> {
    let invalid =
        |reason: &str| AvailabilityError::InvalidTimeFormat(format!("'{input}': {reason}"));

    let mut fields = input.split(':');
    let (hours, minutes) = match (fields.next(), fields.next(), fields.next()) {
        (Some(h), Some(m), None) => (h, m),
        _ => return Err(invalid("expected HH:MM")),
    };

    let hour = parse_field(hours).ok_or_else(|| invalid("hour is not a number"))?;
    let minute = parse_field(minutes).ok_or_else(|| invalid("minute is not a number"))?;
    if hour > 23 {
        return Err(invalid("hour must be in 0..=23"));
    }
    if minute > 59 {
        return Err(invalid("minute must be in 0..=59"));
    }

    let time =
        NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| invalid("not a valid time"))?;
    Ok(REFERENCE_DATE.and_time(time).and_utc())
}

fn parse_field(field: &str) -> Option<u32> {
    if field.is_empty() || field.len() > 2 || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

/// Normalize a start/end pair and require `start < end`.
///
/// # Errors
/// Returns `AvailabilityError::InvalidTimeFormat` if either string is malformed
/// or the range is empty or inverted.
pub fn normalize_range(start: &str, end: &str) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let start_time = normalize_time(start)?;
    let end_time = normalize_time(end)?;
    if start_time >= end_time {
        return Err(AvailabilityError::InvalidTimeFormat(format!(
            "start {start} must be before end {end}"
        )));
    }
    Ok((start_time, end_time))
}

/// Move the time-of-day of `instant` onto `date`, keeping hours and minutes.
pub fn reanchor(instant: DateTime<Utc>, date: NaiveDate) -> DateTime<Utc> {
    date.and_time(instant.time()).and_utc()
}

/// Render the time-of-day of an instant as `"HH:MM"`.
pub fn format_time(instant: DateTime<Utc>) -> String {
    format!("{:02}:{:02}", instant.hour(), instant.minute())
}
