use crate::error::CoreError;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::str::FromStr;

/// Parse and validate an IANA timezone name
pub fn parse_timezone(timezone: &str) -> Result<Tz, CoreError> {
    Tz::from_str(timezone).map_err(|_| CoreError::InvalidTimezone(timezone.to_string()))
}

/// Calendar date of `at` in the given zone
pub fn local_date(at: DateTime<Utc>, tz: &Tz) -> NaiveDate {
    at.with_timezone(tz).date_naive()
}

/// Convert a local wall-clock date and time to UTC.
///
/// Ambiguous times (DST fall back) resolve to the earliest instant. Times that
/// don't exist (DST spring forward) move forward by an hour.
pub fn resolve_local(date: NaiveDate, time: NaiveTime, tz: &Tz) -> DateTime<Utc> {
    let naive = date.and_time(time);
    if let Some(local) = tz.from_local_datetime(&naive).earliest() {
        return local.with_timezone(&Utc);
    }

    let shifted = naive + Duration::hours(1);
    match tz.from_local_datetime(&shifted).earliest() {
        Some(local) => local.with_timezone(&Utc),
        // Gaps longer than an hour: read the wall time as UTC.
        None => naive.and_utc(),
    }
}

/// Format datetime with timezone-aware display
pub fn format_with_timezone(datetime: DateTime<Utc>, tz: &Tz, format: &str) -> String {
    datetime.with_timezone(tz).format(format).to_string()
}
