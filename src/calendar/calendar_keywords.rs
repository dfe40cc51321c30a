//! Keyword-driven event rules supplied by the caller's settings.
//
// Matching is a case-insensitive substring test against the event name.

use super::calendar_types::Event;
use chrono::{Duration, NaiveDateTime};
use log::debug;
use serde::{Deserialize, Serialize};

fn name_matches(keywords: &[String], event: &Event) -> bool {
    let Some(summary) = event.summary.as_deref() else {
        return false;
    };
    let summary = summary.to_lowercase();
    keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .any(|k| summary.contains(&k.to_lowercase()))
}

// Offsets come from user settings; one that leaves chrono's range keeps the time as is.
fn shift(ts: NaiveDateTime, minutes: i64) -> NaiveDateTime {
    match Duration::try_minutes(minutes).and_then(|d| ts.checked_add_signed(d)) {
        Some(shifted) => shifted,
        None => {
            debug!("Offset of {} minutes is out of range for {}", minutes, ts);
            ts
        }
    }
}

/// Highlights important events such as exams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightRule {
    pub keywords: Vec<String>,
}

impl Default for HighlightRule {
    fn default() -> Self {
        Self {
            keywords: ["exam", "test", "midterm", "final"].iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl HighlightRule {
    pub fn new(keywords: Vec<String>) -> Self {
        Self { keywords }
    }

    pub fn matches(&self, event: &Event) -> bool {
        name_matches(&self.keywords, event)
    }
}

/// Shifts the displayed start/end of matching events by a fixed number of minutes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOffsetRule {
    pub keywords: Vec<String>,
    #[serde(default)]
    pub start_offset_minutes: i64,
    #[serde(default)]
    pub end_offset_minutes: i64,
}

impl Default for TimeOffsetRule {
    fn default() -> Self {
        Self {
            keywords: ["lecture", "seminar", "class"].iter().map(|s| s.to_string()).collect(),
            start_offset_minutes: 0,
            end_offset_minutes: -15,
        }
    }
}

impl TimeOffsetRule {
    pub fn applies_to(&self, event: &Event) -> bool {
        name_matches(&self.keywords, event)
    }

    /// Returns a shifted copy of `event`; the original is never touched.
    pub fn apply(&self, event: &Event) -> Event {
        let mut shifted = event.clone();
        if !self.applies_to(event) {
            return shifted;
        }
        if self.start_offset_minutes != 0 {
            shifted.start = event.start.map(|s| shift(s, self.start_offset_minutes));
        }
        if self.end_offset_minutes != 0 {
            shifted.end = event.end.map(|e| shift(e, self.end_offset_minutes));
        }
        shifted
    }

    /// Short marker describing the applied offsets, e.g. `(-15m)`.
    ///
    /// The end offset is only mentioned when the event has an end.
    pub fn offset_label(&self, event: &Event) -> Option<String> {
        if !self.applies_to(event) {
            return None;
        }
        let mut parts = Vec::new();
        if self.start_offset_minutes != 0 {
            parts.push(format!("{:+}m", self.start_offset_minutes));
        }
        if self.end_offset_minutes != 0 && event.end.is_some() {
            parts.push(format!("{:+}m", self.end_offset_minutes));
        }
        if parts.is_empty() {
            None
        } else {
            Some(format!("({})", parts.join(" ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4).and_then(|d| d.and_hms_opt(h, m, 0)).unwrap()
    }

    fn event(summary: &str) -> Event {
        Event {
            summary: Some(summary.to_string()),
            start: Some(at(9, 0)),
            end: Some(at(10, 30)),
            ..Default::default()
        }
    }

    #[test]
    fn test_highlight_is_case_insensitive() {
        let rule = HighlightRule::default();
        assert!(rule.matches(&event("Final EXAM Analysis")));
        assert!(!rule.matches(&event("Tutorial")));
        assert!(!rule.matches(&Event::default()));
    }

    #[test]
    fn test_blank_keywords_never_match() {
        let rule = HighlightRule::new(vec!["".to_string(), "  ".to_string()]);
        assert!(!rule.matches(&event("Anything")));
    }

    #[test]
    fn test_offset_produces_shifted_copy() {
        let rule = TimeOffsetRule { start_offset_minutes: 5, ..Default::default() };
        let original = event("Physics Lecture");
        let shifted = rule.apply(&original);

        assert_eq!(shifted.start, Some(at(9, 5)));
        assert_eq!(shifted.end, Some(at(10, 15)));
        assert_eq!(original.end, Some(at(10, 30)));
        assert_eq!(rule.offset_label(&original).as_deref(), Some("(+5m -15m)"));
    }

    #[test]
    fn test_out_of_range_offset_leaves_time_unchanged() {
        let rule = TimeOffsetRule {
            start_offset_minutes: i64::MAX / 2,
            end_offset_minutes: -1_000_000_000_000,
            ..Default::default()
        };
        let lecture = event("Physics Lecture");
        let shifted = rule.apply(&lecture);

        assert_eq!(shifted.start, Some(at(9, 0)));
        assert_eq!(shifted.end, Some(at(10, 30)));
    }

    #[test]
    fn test_offset_skips_unmatched_events() {
        let rule = TimeOffsetRule::default();
        let original = event("Lab");
        assert_eq!(rule.apply(&original), original);
        assert_eq!(rule.offset_label(&original), None);
    }

    #[test]
    fn test_end_offset_label_needs_end() {
        let rule = TimeOffsetRule::default();
        let open_ended = Event { end: None, ..event("Seminar") };
        assert_eq!(rule.offset_label(&open_ended), None);
        assert_eq!(rule.apply(&open_ended).end, None);
    }
}
