//! Lexical form of `EDate` values.
//!
//! Dates are written in UTC as `yyyy-MM-ddTHH:mm:ss.SSSSSSZ`. Reading is
//! more lenient and tries, in order: the written form, the same without
//! fractional seconds, RFC 3339, a bare local date-time, and a bare date.
//! Values without an offset are taken as UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::error::TypeError;

const WITH_FRACTION: &str = "%Y-%m-%dT%H:%M:%S%.f%:z";
const WITHOUT_FRACTION: &str = "%Y-%m-%dT%H:%M:%S%:z";
const LOCAL_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

/// Format a date in the canonical XMI form.
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Parse a date, trying each accepted form in priority order.
pub fn parse_date(s: &str) -> Result<DateTime<Utc>, TypeError> {
    let s = s.trim();
    let offset_form = match s.strip_suffix('Z') {
        Some(stripped) => format!("{stripped}+00:00"),
        None => s.to_string(),
    };

    if offset_form.contains('.') {
        if let Ok(dt) = DateTime::parse_from_str(&offset_form, WITH_FRACTION) {
            return Ok(dt.with_timezone(&Utc));
        }
    }
    if let Ok(dt) = DateTime::parse_from_str(&offset_form, WITHOUT_FRACTION) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in LOCAL_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }
    Err(TypeError::InvalidDate(s.to_string()))
}
