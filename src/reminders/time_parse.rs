//! Turns user-typed reminder times into UTC instants.
//!
//! Relative inputs (`in 10m`, `in 2h 30m`, `1 day`) are added to `now`.
//! Absolute inputs are read in the caller's IANA timezone:
//! `2025-01-31 18:30`, `01/31/2025 06:30 pm`, `2025-01-31T18:30[:00]`, or an
//! RFC 3339 timestamp carrying its own offset.

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TimeParseError {
    #[error("`{0}` is not a timezone I know. Use an IANA name such as `Europe/Berlin`.")]
    UnknownTimezone(String),
    #[error(
        "I couldn't understand `{0}`. \
         Try `in 10m`, `in 2h 30m`, `2025-01-31 18:00` or `01/31/2025 06:00 pm`."
    )]
    Unrecognized(String),
    #[error("`{0}` does not exist in that timezone (clocks skip over it).")]
    NonexistentLocalTime(String),
    #[error("That time is in the past.")]
    InPast,
    #[error("Reminders can be set at most {MAX_HORIZON_DAYS} days ahead.")]
    TooFar,
}

/// Furthest ahead a reminder may be scheduled.
pub const MAX_HORIZON_DAYS: i64 = 5 * 365;

const ABSOLUTE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %I:%M%p",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

pub fn parse_timezone(name: &str) -> Result<Tz, TimeParseError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| TimeParseError::UnknownTimezone(name.trim().to_string()))
}

/// Resolves `input` to a future UTC instant.
pub fn parse_when(
    input: &str,
    timezone: &str,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, TimeParseError> {
    let tz = parse_timezone(timezone)?;
    let text = input.trim();

    let when = match parse_relative(text) {
        Some(duration) => now
            .checked_add_signed(duration)
            .ok_or(TimeParseError::TooFar)?,
        None => parse_absolute(text, tz)?,
    };

    if when <= now {
        return Err(TimeParseError::InPast);
    }
    if when - now > Duration::days(MAX_HORIZON_DAYS) {
        return Err(TimeParseError::TooFar);
    }
    Ok(when)
}

/// Sum of every `<amount><unit>` pair, with an optional leading `in`.
pub fn parse_relative(input: &str) -> Option<Duration> {
    let lowered = input.trim().to_lowercase();
    let body = lowered
        .strip_prefix("in ")
        .map(str::trim_start)
        .unwrap_or(&lowered);
    if body.is_empty() {
        return None;
    }

    let mut total = Duration::zero();
    let mut rest = body;
    let mut matched_any = false;

    while !rest.is_empty() {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ',');
        if rest.is_empty() {
            break;
        }
        if let Some(tail) = rest.strip_prefix("and ") {
            rest = tail;
            continue;
        }

        let digits_len = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits_len == 0 {
            return None;
        }
        let amount: i64 = rest[..digits_len].parse().ok()?;
        rest = rest[digits_len..].trim_start();

        let unit_len = rest.chars().take_while(|c| c.is_ascii_alphabetic()).count();
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        let piece = match unit {
            "s" | "sec" | "secs" | "second" | "seconds" => Duration::try_seconds(amount)?,
            "m" | "min" | "mins" | "minute" | "minutes" => Duration::try_minutes(amount)?,
            "h" | "hr" | "hrs" | "hour" | "hours" => Duration::try_hours(amount)?,
            "d" | "day" | "days" => Duration::try_days(amount)?,
            "w" | "week" | "weeks" => Duration::try_weeks(amount)?,
            _ => return None,
        };
        total = total.checked_add(&piece)?;
        matched_any = true;
    }

    matched_any.then_some(total)
}

fn parse_absolute(input: &str, tz: Tz) -> Result<DateTime<Utc>, TimeParseError> {
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(input) {
        return Ok(with_offset.with_timezone(&Utc));
    }

    let normalized = input.to_uppercase();
    let naive = ABSOLUTE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&normalized, format).ok())
        .ok_or_else(|| TimeParseError::Unrecognized(input.to_string()))?;

    match tz.from_local_datetime(&naive) {
        LocalResult::Single(local) => Ok(local.with_timezone(&Utc)),
        // Ambiguous wall times (clocks falling back) resolve to the first occurrence.
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
        LocalResult::None => Err(TimeParseError::NonexistentLocalTime(input.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_relative_offsets_are_exact() {
        let cases = [
            ("in 10m", 10 * 60_000),
            ("in 2h 30m", (2 * 60 + 30) * 60_000),
            ("in 1d", 24 * 60 * 60_000),
            ("in 45s", 45_000),
            ("in 1w", 7 * 24 * 60 * 60_000),
            ("10 minutes", 10 * 60_000),
            ("in 1 hour and 5 minutes", 65 * 60_000),
            ("IN 3H", 3 * 60 * 60_000),
        ];
        for (input, millis) in cases {
            let when = parse_when(input, "UTC", now()).unwrap();
            assert_eq!(
                when.timestamp_millis() - now().timestamp_millis(),
                millis,
                "input {input:?}"
            );
        }
    }

    #[test]
    fn test_relative_ignores_timezone() {
        let utc = parse_when("in 10m", "UTC", now()).unwrap();
        let tokyo = parse_when("in 10m", "Asia/Tokyo", now()).unwrap();
        assert_eq!(utc, tokyo);
    }

    #[test]
    fn test_absolute_formats_in_timezone() {
        // 2025-03-02 09:30 in New York (EST, UTC-5) is 14:30 UTC.
        let expected = Utc.with_ymd_and_hms(2025, 3, 2, 14, 30, 0).unwrap();
        for input in [
            "2025-03-02 09:30",
            "03/02/2025 09:30 am",
            "03/02/2025 09:30 AM",
            "2025-03-02T09:30",
            "2025-03-02T09:30:00",
        ] {
            let when = parse_when(input, "America/New_York", now()).unwrap();
            assert_eq!(when, expected, "input {input:?}");
            assert_eq!(when.timestamp_millis(), expected.timestamp_millis());
        }
    }

    #[test]
    fn test_pm_and_utc() {
        let when = parse_when("03/02/2025 06:15 pm", "UTC", now()).unwrap();
        assert_eq!(when, Utc.with_ymd_and_hms(2025, 3, 2, 18, 15, 0).unwrap());
    }

    #[test]
    fn test_rfc3339_uses_own_offset() {
        let when = parse_when("2025-03-02T10:00:00+02:00", "America/New_York", now()).unwrap();
        assert_eq!(when, Utc.with_ymd_and_hms(2025, 3, 2, 8, 0, 0).unwrap());
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            parse_when("in 10m", "Mars/Olympus", now()),
            Err(TimeParseError::UnknownTimezone("Mars/Olympus".to_string()))
        );
        assert!(matches!(
            parse_when("whenever", "UTC", now()),
            Err(TimeParseError::Unrecognized(_))
        ));
        assert!(matches!(
            parse_when("in 10 parsecs", "UTC", now()),
            Err(TimeParseError::Unrecognized(_))
        ));
        assert_eq!(
            parse_when("2020-01-01 00:00", "UTC", now()),
            Err(TimeParseError::InPast)
        );
        assert_eq!(parse_when("in 0m", "UTC", now()), Err(TimeParseError::InPast));
    }

    #[test]
    fn test_far_future_is_rejected() {
        assert_eq!(parse_when("in 100000000w", "UTC", now()), Err(TimeParseError::TooFar));
        assert_eq!(
            parse_when(&format!("in {}d", i64::MAX / 86_400_000), "UTC", now()),
            Err(TimeParseError::TooFar)
        );
        assert_eq!(parse_when("2999-01-01 00:00", "UTC", now()), Err(TimeParseError::TooFar));
        assert!(parse_when(&format!("in {MAX_HORIZON_DAYS}d"), "UTC", now()).is_ok());
    }

    #[test]
    fn test_nonexistent_local_time() {
        // US spring-forward: 2025-03-09 02:30 does not exist in New York.
        assert!(matches!(
            parse_when("2025-03-09 02:30", "America/New_York", now()),
            Err(TimeParseError::NonexistentLocalTime(_))
        ));
    }
}
