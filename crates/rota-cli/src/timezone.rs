use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rota_core::error::CoreError;
use rota_core::timezone::parse_timezone;

/// Detect system timezone
pub fn detect_system_timezone() -> String {
    if let Ok(tz) = std::env::var("TZ") {
        if !tz.is_empty() && parse_timezone(&tz).is_ok() {
            return tz;
        }
    }

    if let Ok(tz) = iana_time_zone::get_timezone() {
        if parse_timezone(&tz).is_ok() {
            return tz;
        }
    }

    "UTC".to_string()
}

fn common_timezones() -> [&'static str; 18] {
    [
        "UTC",
        "America/New_York",
        "America/Chicago",
        "America/Denver",
        "America/Los_Angeles",
        "America/Sao_Paulo",
        "Europe/London",
        "Europe/Paris",
        "Europe/Berlin",
        "Europe/Istanbul",
        "Europe/Madrid",
        "Asia/Tokyo",
        "Asia/Shanghai",
        "Asia/Kolkata",
        "Asia/Dubai",
        "Australia/Sydney",
        "Australia/Melbourne",
        "Pacific/Auckland",
    ]
}

/// Suggest similar timezone for invalid input
pub fn suggest_timezone(invalid: &str) -> Vec<&'static str> {
    let invalid_lower = invalid.to_lowercase();

    let mut matches: Vec<_> = common_timezones()
        .into_iter()
        .filter(|tz| {
            let tz_lower = tz.to_lowercase();
            tz_lower.contains(&invalid_lower)
                || invalid_lower.contains(&tz_lower)
                || tz.split('/').any(|part| part.to_lowercase().contains(&invalid_lower))
        })
        .collect();

    matches.truncate(5);
    matches
}

/// Convert user-friendly timezone input to a zone.
///
/// Accepts IANA names and a handful of common abbreviations.
pub fn normalize_timezone_input(input: &str) -> Result<Tz, CoreError> {
    if let Ok(tz) = parse_timezone(input) {
        return Ok(tz);
    }

    let normalized = match input.to_lowercase().as_str() {
        "est" | "eastern" => "America/New_York",
        "cst" | "central" => "America/Chicago",
        "mst" | "mountain" => "America/Denver",
        "pst" | "pacific" => "America/Los_Angeles",
        "gmt" | "utc" | "z" => "UTC",
        "bst" | "london" => "Europe/London",
        "cet" | "paris" => "Europe/Paris",
        "trt" | "istanbul" => "Europe/Istanbul",
        "jst" | "tokyo" => "Asia/Tokyo",
        _ => {
            let suggestions = suggest_timezone(input);
            return Err(CoreError::InvalidTimezone(if suggestions.is_empty() {
                format!(
                    "Unknown timezone '{}'. Use standard IANA names like 'America/New_York'",
                    input
                )
            } else {
                format!("Unknown timezone '{}'. Did you mean: {}?", input, suggestions.join(", "))
            }));
        }
    };

    parse_timezone(normalized)
}

/// Format a due instant for display in the configured zone.
///
/// Instances without a preferred time only show their date.
pub fn format_due(datetime: DateTime<Utc>, tz: &Tz, time_specified: bool) -> String {
    let local = datetime.with_timezone(tz);
    if time_specified {
        local.format("%a %Y-%m-%d %H:%M").to_string()
    } else {
        local.format("%a %Y-%m-%d").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_normalize_accepts_iana_and_abbreviations() {
        assert_eq!(normalize_timezone_input("Europe/Berlin").unwrap(), Tz::Europe__Berlin);
        assert_eq!(normalize_timezone_input("PST").unwrap(), Tz::America__Los_Angeles);
        assert_eq!(normalize_timezone_input("utc").unwrap(), Tz::UTC);
    }

    #[test]
    fn test_normalize_suggests_on_partial_match() {
        let err = normalize_timezone_input("Berlin").unwrap_err();
        assert!(err.to_string().contains("Europe/Berlin"));
    }

    #[test]
    fn test_format_due_hides_default_time() {
        let at = Utc.with_ymd_and_hms(2026, 10, 16, 21, 59, 59).unwrap();
        let tz = Tz::Europe__Berlin;
        assert_eq!(format_due(at, &tz, false), "Fri 2026-10-16");
        assert_eq!(format_due(at, &tz, true), "Fri 2026-10-16 23:59");
    }
}
