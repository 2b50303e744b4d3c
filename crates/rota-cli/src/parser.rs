use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_english::{parse_date_string, Dialect};
use chrono_tz::Tz;
use rota_core::models::{DaysOfWeek, PreferredTime};

/// Parses a calendar date: `2026-10-20`, `tomorrow`, `friday`, `next week`...
///
/// Relative forms are resolved against `now` in `tz`.
pub fn parse_date(input: &str, tz: &Tz, now: DateTime<Utc>) -> Result<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d") {
        return Ok(date);
    }
    parse_date_string(input, now.with_timezone(tz), Dialect::Uk)
        .map(|at| at.date_naive())
        .map_err(|e| anyhow!("Failed to parse date '{}': {}", input, e))
}

/// Parse time string like "9:00 AM", "14:30", "9pm", "noon", "midnight"
pub fn parse_time(input: &str) -> Result<PreferredTime> {
    if let Ok(time) = PreferredTime::parse(input) {
        return Ok(time);
    }

    let normalized = input.trim().to_lowercase();
    match normalized.as_str() {
        "noon" => return Ok(PreferredTime::parse("12:00")?),
        "midnight" => return Ok(PreferredTime::parse("00:00")?),
        _ => {}
    }

    // "9pm" carries no minutes, which chrono refuses to parse.
    let compact = normalized.replace(' ', "");
    let with_minutes = match compact.strip_suffix("am").or_else(|| compact.strip_suffix("pm")) {
        Some(hour) if !hour.contains(':') => format!("{}:00{}", hour, &compact[hour.len()..]),
        _ => compact.clone(),
    };
    for format in ["%I:%M:%S%p", "%I:%M%p"] {
        if let Ok(time) = NaiveTime::parse_from_str(&with_minutes, format) {
            return Ok(PreferredTime::from_time(time));
        }
    }

    Err(anyhow!(
        "Invalid time format: '{}'\n\nSupported formats:\n  • 24-hour: '14:30', '09:00'\n  • 12-hour: '2:30 PM', '9:00 AM'\n  • Compact: '2pm', '9am'\n  • Special: 'noon', 'midnight'",
        input
    ))
}

/// Parse days string like "mon,wed,fri", "1,3,5" or "weekdays"
pub fn parse_days(input: &str) -> Result<DaysOfWeek> {
    let normalized = input.trim().to_lowercase();

    match normalized.as_str() {
        "weekdays" | "workdays" => return Ok(DaysOfWeek::from_iso(1..=5)?),
        "weekends" => return Ok(DaysOfWeek::from_iso([6, 7])?),
        "daily" | "everyday" => return Ok(DaysOfWeek::from_iso(1..=7)?),
        _ => {}
    }

    let mut days = Vec::new();
    let mut invalid = Vec::new();
    for day in normalized.split(',').map(str::trim).filter(|d| !d.is_empty()) {
        let iso = match day {
            "mon" | "monday" | "m" | "1" => 1,
            "tue" | "tuesday" | "tu" | "2" => 2,
            "wed" | "wednesday" | "w" | "3" => 3,
            "thu" | "thursday" | "th" | "4" => 4,
            "fri" | "friday" | "f" | "5" => 5,
            "sat" | "saturday" | "sa" | "6" => 6,
            "sun" | "sunday" | "su" | "7" => 7,
            _ => {
                invalid.push(day.to_string());
                continue;
            }
        };
        days.push(iso);
    }

    if !invalid.is_empty() {
        return Err(anyhow!(
            "Invalid day(s): {}\n\nSupported formats:\n  • Names: 'monday,wednesday' or 'mon,wed'\n  • ISO numbers: '1,3,5' (1 = Monday)\n  • Groups: 'weekdays', 'weekends', 'daily'",
            invalid.join(", ")
        ));
    }
    if days.is_empty() {
        return Err(anyhow!("No valid days specified in: '{}'", input));
    }

    Ok(DaysOfWeek::from_iso(days)?)
}
