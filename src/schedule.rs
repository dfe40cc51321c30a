//! Daily schedule analysis: free-time windows and the current/next event.
//!
//! All arithmetic is on naive wall-clock time. Callers pass one day's events;
//! they are sorted locally and the caller's slice is left as it was.

use crate::calendar::{format_minute_of_day, minute_of_day, truncate_to_minute, Event};
use chrono::{Days, Duration, NaiveDate, NaiveDateTime, Timelike};
use log::debug;
use serde::Serialize;
use std::fmt;

/// Breaks shorter than this are not worth showing.
pub const MIN_BREAK_MINUTES: i64 = 10;
/// Breaks under this length are flagged as short.
pub const SHORT_BREAK_MINUTES: i64 = 30;
/// An upcoming event this close gets a countdown.
pub const SOON_MINUTES: i64 = 30;

const DAY_START: i64 = 9 * 60;
const MORNING_CUTOFF: i64 = 10 * 60;
const DAY_END: i64 = 18 * 60;
const MORNING_LEAD: i64 = 90;
const MORNING_BUFFER: i64 = 15;
const TRANSITION_BUFFER: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakKind {
    Morning,
    Lunch,
    Afternoon,
    Evening,
    Generic,
}

impl fmt::Display for BreakKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BreakKind::Morning => "morning break",
            BreakKind::Lunch => "lunch",
            BreakKind::Afternoon => "afternoon break",
            BreakKind::Evening => "evening break",
            BreakKind::Generic => "break",
        };
        f.write_str(label)
    }
}

/// A free-time window, in minutes since midnight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakSlot {
    pub start_minute: u32,
    pub end_minute: u32,
    pub kind: BreakKind,
    pub duration_minutes: u32,
    pub is_short: bool,
}

impl BreakSlot {
    fn new(start_minute: i64, end_minute: i64, kind: BreakKind) -> Option<Self> {
        let duration = (end_minute - start_minute).max(0);
        if duration < MIN_BREAK_MINUTES {
            return None;
        }
        Some(Self {
            start_minute: start_minute as u32,
            end_minute: end_minute as u32,
            kind,
            duration_minutes: duration as u32,
            is_short: duration < SHORT_BREAK_MINUTES,
        })
    }

    /// `HH:MM - HH:MM` rendering of the window.
    pub fn time_range(&self) -> String {
        format!(
            "{} - {}",
            format_minute_of_day(self.start_minute),
            format_minute_of_day(self.end_minute)
        )
    }
}

/// The next event to start, with a countdown when it is close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpcomingEvent {
    pub event: Event,
    pub minutes_until: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DaySchedule {
    pub breaks: Vec<BreakSlot>,
    pub current: Option<Event>,
    pub upcoming: Option<UpcomingEvent>,
    /// The current event if there is one, otherwise the upcoming one.
    pub next: Option<Event>,
}

/// Where an event stands relative to a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventProgress {
    Pending,
    Ongoing,
    Done,
}

/// One calendar day's events in start order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayEvents {
    pub date: NaiveDate,
    pub events: Vec<Event>,
}

fn sorted_by_start(events: &[Event]) -> Vec<&Event> {
    let mut sorted: Vec<&Event> = events.iter().filter(|e| e.start.is_some()).collect();
    sorted.sort_by_key(|e| e.start);
    sorted
}

fn classify_gap(start: NaiveDateTime, duration: i64) -> BreakKind {
    match start.hour() {
        11..=14 if duration >= SHORT_BREAK_MINUTES => BreakKind::Lunch,
        15..=17 => BreakKind::Afternoon,
        _ => BreakKind::Generic,
    }
}

/// Free-time windows before, between and after the given events.
pub fn find_breaks(events: &[Event]) -> Vec<BreakSlot> {
    let sorted = sorted_by_start(events);
    let (Some(first), Some(last)) = (sorted.first(), sorted.last()) else {
        return Vec::new();
    };
    let mut breaks = Vec::new();

    if let Some(first_start) = first.start.map(|s| minute_of_day(s) as i64) {
        if first_start > MORNING_CUTOFF {
            let start = DAY_START.max(first_start - MORNING_LEAD);
            breaks.extend(BreakSlot::new(start, first_start - MORNING_BUFFER, BreakKind::Morning));
        }
    }

    for pair in sorted.windows(2) {
        let (Some(prev_end), Some(next_start)) = (pair[0].end_or_start(), pair[1].start) else {
            continue;
        };
        let window_start = prev_end + Duration::minutes(TRANSITION_BUFFER);
        let window_end = next_start - Duration::minutes(TRANSITION_BUFFER);
        let duration = (window_end - window_start).num_minutes();
        if duration < MIN_BREAK_MINUTES {
            continue;
        }
        let kind = classify_gap(window_start, duration);
        breaks.extend(BreakSlot::new(
            minute_of_day(window_start) as i64,
            minute_of_day(window_start) as i64 + duration,
            kind,
        ));
    }

    if let Some(last_end) = last.end_or_start().map(|e| minute_of_day(e) as i64) {
        if last_end < DAY_END {
            breaks.extend(BreakSlot::new(last_end + TRANSITION_BUFFER, DAY_END, BreakKind::Evening));
        }
    }

    debug!("Found {} breaks among {} events", breaks.len(), sorted.len());
    breaks
}

/// Breaks plus the current, upcoming and next event for one day.
pub fn analyze_day(events: &[Event], now: NaiveDateTime) -> DaySchedule {
    let sorted = sorted_by_start(events);

    let current = sorted
        .iter()
        .find(|e| event_progress(e, now) == Some(EventProgress::Ongoing))
        .map(|e| (*e).clone());

    let upcoming = sorted
        .iter()
        .find(|e| matches!(e.start, Some(s) if s > now))
        .and_then(|e| {
            // Whole wall-clock minutes, so 09:59:10 to 10:30 counts as 31.
            let minutes = (truncate_to_minute(e.start?) - truncate_to_minute(now)).num_minutes();
            Some(UpcomingEvent {
                event: (*e).clone(),
                minutes_until: (minutes <= SOON_MINUTES).then_some(minutes),
            })
        });

    let next = current.clone().or_else(|| upcoming.as_ref().map(|u| u.event.clone()));

    DaySchedule { breaks: find_breaks(events), current, upcoming, next }
}

/// Progress of a single event at `now`; `None` for events without a start.
pub fn event_progress(event: &Event, now: NaiveDateTime) -> Option<EventProgress> {
    let start = event.start?;
    let end = event.effective_end()?;
    Some(if now < start {
        EventProgress::Pending
    } else if now <= end {
        EventProgress::Ongoing
    } else {
        EventProgress::Done
    })
}

/// Events starting on `date`, in start order.
pub fn events_on(events: &[Event], date: NaiveDate) -> Vec<Event> {
    sorted_by_start(events)
        .into_iter()
        .filter(|e| e.start_date() == Some(date))
        .cloned()
        .collect()
}

/// The seven days starting at `today`, grouped per date; empty days are omitted.
pub fn week_ahead(events: &[Event], today: NaiveDate) -> Vec<DayEvents> {
    let end = today.checked_add_days(Days::new(7)).unwrap_or(NaiveDate::MAX);
    let mut days: Vec<DayEvents> = Vec::new();
    for event in sorted_by_start(events) {
        let Some(date) = event.start_date() else { continue };
        if date < today || date >= end {
            continue;
        }
        match days.last_mut() {
            Some(day) if day.date == date => day.events.push(event.clone()),
            _ => days.push(DayEvents { date, events: vec![event.clone()] }),
        }
    }
    days
}
