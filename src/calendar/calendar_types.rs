//! Core calendar record types.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Name used for events that carry no SUMMARY.
pub const UNTITLED: &str = "Untitled";

/// Duration assumed for events without a DTEND.
pub const DEFAULT_EVENT_MINUTES: i64 = 60;

/// A single VEVENT as extracted from a feed.
///
/// All timestamps are naive wall-clock values; any timezone suffix in the
/// source is dropped at parse time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub summary: Option<String>,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub recurrence_rule: Option<String>,
}

impl Event {
    /// Event name, falling back to [`UNTITLED`].
    pub fn name(&self) -> &str {
        self.summary.as_deref().unwrap_or(UNTITLED)
    }

    /// End used for status checks: DTEND, or one hour after start.
    pub fn effective_end(&self) -> Option<NaiveDateTime> {
        match (self.start, self.end) {
            (_, Some(end)) => Some(end),
            (Some(start), None) => Some(start + Duration::minutes(DEFAULT_EVENT_MINUTES)),
            (None, None) => None,
        }
    }

    /// End used for break computation: DTEND, or the start itself.
    pub fn end_or_start(&self) -> Option<NaiveDateTime> {
        self.end.or(self.start)
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        self.start.map(|s| s.date())
    }

    /// Start time truncated to the minute, which is the granularity patterns use.
    pub fn start_time_of_day(&self) -> Option<NaiveTime> {
        self.start
            .and_then(|s| NaiveTime::from_hms_opt(s.hour(), s.minute(), 0))
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence_rule.is_some()
    }
}

/// Minutes elapsed since midnight for a wall-clock timestamp.
pub fn minute_of_day(ts: NaiveDateTime) -> u32 {
    ts.hour() * 60 + ts.minute()
}

/// Drops seconds and sub-second precision.
pub fn truncate_to_minute(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_second(0).and_then(|t| t.with_nanosecond(0)).unwrap_or(ts)
}

/// Formats a minute-of-day value as `HH:MM`.
pub fn format_minute_of_day(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}
