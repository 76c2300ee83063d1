use chrono::{Duration, NaiveTime};
use serde::Serialize;
use std::fmt;

/// Whether a start-time label carried an am/pm marker or was already
/// on the 24-hour clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeFormat {
    TwelveHour(Meridiem),
    TwentyFourHour,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Meridiem {
    Am,
    Pm,
}

/// A start-time label parsed into its parts, with the format decided once.
///
/// `hour` and `minute` are kept exactly as written; 12-hour arithmetic
/// happens only when the label is converted to a canonical time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTimeLabel {
    pub raw: String,
    pub format: TimeFormat,
    pub hour: u32,
    pub minute: u32,
}

impl StartTimeLabel {
    /// Canonical 24-hour rendering, zero padded ("19:00", "07:05").
    pub fn normalize(&self) -> String {
        let (hour, minute) = self.canonical_hour_minute();
        format!("{:02}:{:02}", hour, minute)
    }

    /// The label as a time of day, or `None` when the written digits do
    /// not land on a real clock position ("25:00", "7:75 pm").
    pub fn to_naive_time(&self) -> Option<NaiveTime> {
        let (hour, minute) = self.canonical_hour_minute();
        NaiveTime::from_hms_opt(hour, minute, 0)
    }

    // 12pm stays 12, 12am becomes 0, other pm hours gain 12.
    fn canonical_hour_minute(&self) -> (u32, u32) {
        match self.format {
            TimeFormat::TwentyFourHour => (self.hour, self.minute),
            TimeFormat::TwelveHour(Meridiem::Pm) if self.hour != 12 => (self.hour + 12, self.minute),
            TimeFormat::TwelveHour(Meridiem::Am) if self.hour == 12 => (0, self.minute),
            TimeFormat::TwelveHour(_) => (self.hour, self.minute),
        }
    }
}

/// The two reminder windows, measured back from the lesson start.
///
/// A window covers `(0, bound]` of remaining time: an event exactly at
/// the bound is inside, an event at or past start is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderWindow {
    OneHour,
    OneMinute,
}

impl ReminderWindow {
    /// Walked in order on every pass so the hour reminder lands before
    /// the final one when both are due.
    pub const ALL: [ReminderWindow; 2] = [ReminderWindow::OneHour, ReminderWindow::OneMinute];

    pub fn upper_bound(&self) -> Duration {
        match self {
            ReminderWindow::OneHour => Duration::minutes(60),
            ReminderWindow::OneMinute => Duration::minutes(1),
        }
    }

    pub fn contains(&self, remaining: Duration) -> bool {
        remaining > Duration::zero() && remaining <= self.upper_bound()
    }

    /// Stable identifier used in the send ledger.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderWindow::OneHour => "one_hour",
            ReminderWindow::OneMinute => "one_minute",
        }
    }
}

impl fmt::Display for ReminderWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A join URL together with where it came from.
///
/// `Degraded` links are synthesized locally when the conference provider
/// is unavailable; they are still delivered, just flagged as such.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeetingLink {
    Live(String),
    Degraded(String),
}

impl MeetingLink {
    pub fn url(&self) -> &str {
        match self {
            MeetingLink::Live(url) | MeetingLink::Degraded(url) => url,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, MeetingLink::Degraded(_))
    }

    /// Ledger tag for the link origin.
    pub fn source(&self) -> &'static str {
        match self {
            MeetingLink::Live(_) => "live",
            MeetingLink::Degraded(_) => "degraded",
        }
    }
}

/// Result of one send attempt to one recipient.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryOutcome {
    pub email: String,
    pub accepted: bool,
    pub receipt_id: Option<String>,
    pub error: Option<String>,
}

/// Result of firing one window for one lesson: both recipients, in one place.
#[derive(Debug, Clone, Serialize)]
pub struct WindowDelivery {
    pub window: ReminderWindow,
    pub student: DeliveryOutcome,
    pub tutor: DeliveryOutcome,
}

impl WindowDelivery {
    pub fn all_ok(&self) -> bool {
        self.student.accepted && self.tutor.accepted
    }

    pub fn failed_count(&self) -> usize {
        [&self.student, &self.tutor]
            .iter()
            .filter(|outcome| !outcome.accepted)
            .count()
    }
}
