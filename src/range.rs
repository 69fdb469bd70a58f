//! Range validation for booking form fields.
//!
//! The same rule backs three field shapes (date, time of day, date-time):
//! the end must come strictly after the start. Absent or unparseable values
//! produce no opinion; required-ness and malformed input are reported elsewhere.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::booking::TimeRange;
use crate::error::RangeInvalid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RangeKind {
    Date,
    Time,
    DateTime,
}

impl RangeKind {
    /// Inline message shown next to the offending fields.
    pub fn message(&self) -> &'static str {
        match self {
            RangeKind::Date => "The end date must be after the start date",
            RangeKind::Time => "The end time must be after the start time",
            RangeKind::DateTime => "The end date and time must be after the start date and time",
        }
    }
}

impl fmt::Display for RangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

pub type ValidationOutcome = Result<(), RangeInvalid>;

/// Check two already-parsed values.
pub fn validate_range<T: PartialOrd>(kind: RangeKind, start: &T, end: &T) -> ValidationOutcome {
    if end <= start {
        Err(RangeInvalid { kind })
    } else {
        Ok(())
    }
}

/// Check two raw field values, parsing each with `parse`.
///
/// Missing or empty fields and values `parse` rejects yield `Ok(())`.
pub fn validate_fields_with<T, F>(
    kind: RangeKind,
    start: Option<&str>,
    end: Option<&str>,
    parse: F,
) -> ValidationOutcome
where
    T: PartialOrd,
    F: Fn(&str) -> Option<T>,
{
    let (start, end) = match (non_empty(start), non_empty(end)) {
        (Some(start), Some(end)) => (start, end),
        _ => return Ok(()),
    };

    match (parse(start), parse(end)) {
        (Some(start), Some(end)) => validate_range(kind, &start, &end),
        _ => {
            tracing::debug!("Skipping {:?} range check: unparseable input", kind);
            Ok(())
        }
    }
}

/// Date-only fields, e.g. `2024-01-15`.
pub fn validate_date_fields(start: Option<&str>, end: Option<&str>) -> ValidationOutcome {
    validate_fields_with(RangeKind::Date, start, end, parse_date)
}

/// Time-of-day fields on the same calendar day, e.g. `09:30`.
pub fn validate_time_fields(start: Option<&str>, end: Option<&str>) -> ValidationOutcome {
    validate_fields_with(RangeKind::Time, start, end, parse_time)
}

/// Combined date-time fields, e.g. `2024-01-15T09:30` or RFC 3339.
pub fn validate_date_time_fields(start: Option<&str>, end: Option<&str>) -> ValidationOutcome {
    validate_fields_with(RangeKind::DateTime, start, end, parse_date_time)
}

/// Dispatch on the field shape.
pub fn validate_fields(kind: RangeKind, start: Option<&str>, end: Option<&str>) -> ValidationOutcome {
    match kind {
        RangeKind::Date => validate_date_fields(start, end),
        RangeKind::Time => validate_time_fields(start, end),
        RangeKind::DateTime => validate_date_time_fields(start, end),
    }
}

/// Check optional instants; absent values produce no opinion.
pub fn validate_instants(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> ValidationOutcome {
    match (start, end) {
        (Some(start), Some(end)) => validate_range(RangeKind::DateTime, &start, &end),
        _ => Ok(()),
    }
}

pub fn validate_time_range(range: &TimeRange) -> ValidationOutcome {
    validate_range(RangeKind::DateTime, &range.start, &range.end)
}

/// Only `YYYY-MM-DD`; a value carrying a time is not a date field.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

pub fn parse_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .ok()
}

/// Accepts RFC 3339 and naive `YYYY-MM-DD[T ]HH:MM[:SS]` (read as UTC).
pub fn parse_date_time(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
