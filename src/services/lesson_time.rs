use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::error::TimeLabelError;
use crate::models::schedule::{Meridiem, StartTimeLabel, TimeFormat};

/// Parse a stored start-time label into its tagged form.
///
/// Accepted shapes are "H:MM am", "H:MM pm" (case and spacing loose)
/// and 24-hour "HH:MM". The format decision is made here, once; the
/// digits are kept as written and only canonicalized on conversion.
pub fn parse_time_label(raw: &str) -> Result<StartTimeLabel, TimeLabelError> {
    let trimmed = raw.trim();
    let lower = trimmed.to_lowercase();

    let (digits, format) = if let Some(stripped) = lower.strip_suffix("am") {
        (
            stripped.trim_end(),
            TimeFormat::TwelveHour(Meridiem::Am),
        )
    } else if let Some(stripped) = lower.strip_suffix("pm") {
        (
            stripped.trim_end(),
            TimeFormat::TwelveHour(Meridiem::Pm),
        )
    } else {
        (lower.as_str(), TimeFormat::TwentyFourHour)
    };

    let (hour_part, minute_part) = digits.split_once(':').ok_or_else(|| {
        TimeLabelError::MissingColon {
            label: raw.to_string(),
        }
    })?;

    let hour = hour_part
        .trim()
        .parse::<u32>()
        .map_err(|_| TimeLabelError::NotNumeric {
            label: raw.to_string(),
        })?;
    let minute = minute_part
        .trim()
        .parse::<u32>()
        .map_err(|_| TimeLabelError::NotNumeric {
            label: raw.to_string(),
        })?;

    Ok(StartTimeLabel {
        raw: trimmed.to_string(),
        format,
        hour,
        minute,
    })
}

/// Combine a lesson's calendar date with its parsed label into the
/// start instant. Lesson times are stored in UTC.
pub fn resolve_start_instant(
    date: NaiveDate,
    label: &StartTimeLabel,
) -> Result<DateTime<Utc>, TimeLabelError> {
    let time = label.to_naive_time().ok_or_else(|| TimeLabelError::OutOfRange {
        label: label.raw.clone(),
    })?;
    Ok(date.and_time(time).and_utc())
}

/// Parse and resolve in one step, the path every ingested lesson takes.
pub fn resolve_lesson_start(
    date: NaiveDate,
    raw_label: &str,
) -> Result<DateTime<Utc>, TimeLabelError> {
    let label = parse_time_label(raw_label)?;
    resolve_start_instant(date, &label)
}

/// Whole minutes until start, truncated toward zero. Display only;
/// window checks work on the exact remaining duration.
pub fn minutes_until(start: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (start - now).num_minutes()
}

/// Human wording for the countdown: "1h 5m", "45m", "0m", or "started".
pub fn describe_time_until(start: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let remaining = start - now;
    if remaining <= Duration::zero() {
        return "started".to_string();
    }

    let minutes = remaining.num_minutes();
    if minutes >= 60 {
        format!("{}h {}m", minutes / 60, minutes % 60)
    } else {
        format!("{}m", minutes)
    }
}
