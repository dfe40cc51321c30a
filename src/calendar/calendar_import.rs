//! iCalendar feed import.
//
// Only the VEVENT fields the analysers consume are extracted. Malformed input
// never aborts a pass: bad lines are skipped and bad dates leave the field empty.

use super::CalendarError;
use super::calendar_types::Event;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use log::debug;

const BEGIN_EVENT: &str = "BEGIN:VEVENT";
const END_EVENT: &str = "END:VEVENT";

/// Resolve RFC 5545 line folding.
///
/// A physical line starting with a space or tab continues the previous logical
/// line; its first character is dropped before concatenation.
pub fn unfold_lines(text: &str) -> Vec<String> {
    let mut logical: Vec<String> = Vec::new();
    for line in text.lines() {
        let is_continuation = line.starts_with(' ') || line.starts_with('\t');
        match logical.last_mut() {
            Some(previous) if is_continuation => previous.push_str(&line[1..]),
            _ => logical.push(line.to_string()),
        }
    }
    logical
}

/// Parse a raw feed into events, preserving block order.
pub fn parse_feed(text: &str) -> Vec<Event> {
    let mut events = Vec::new();
    let mut current: Option<Event> = None;

    for line in unfold_lines(text) {
        if line == BEGIN_EVENT {
            if current.is_some() {
                debug!("Discarding unterminated VEVENT block");
            }
            current = Some(Event::default());
        } else if line == END_EVENT {
            if let Some(event) = current.take() {
                events.push(event);
            }
        } else if let Some(event) = current.as_mut() {
            apply_property(event, &line);
        }
    }

    if current.is_some() {
        debug!("Feed ended inside a VEVENT block, dropping it");
    }
    debug!("Parsed {} events from feed", events.len());
    events
}

/// Like [`parse_feed`], but treats a feed without any events as an error.
pub fn load_feed(text: &str) -> Result<Vec<Event>, CalendarError> {
    let events = parse_feed(text);
    if events.is_empty() {
        return Err(CalendarError::EmptyCalendar);
    }
    Ok(events)
}

fn apply_property(event: &mut Event, line: &str) {
    let Some((name_part, value)) = line.split_once(':') else {
        return;
    };
    let key = name_part.split(';').next().unwrap_or(name_part);

    match key {
        "SUMMARY" => event.summary = Some(value.to_string()),
        "DTSTART" => event.start = decode_date(value),
        "DTEND" => event.end = decode_date(value),
        "LOCATION" => event.location = Some(value.to_string()),
        "DESCRIPTION" => event.description = Some(value.to_string()),
        "RRULE" => event.recurrence_rule = Some(value.to_string()),
        _ => {}
    }
}

fn decode_date(value: &str) -> Option<NaiveDateTime> {
    match parse_ics_date(value) {
        Ok(ts) => Some(ts),
        Err(e) => {
            debug!("Ignoring date value: {}", e);
            None
        }
    }
}

/// Decode an iCalendar date or date-time value as naive local time.
///
/// `YYYYMMDD` is an all-day date at midnight. Values containing `T` are read as
/// `YYYYMMDDTHHMMSS` with any trailing `Z` or offset ignored. Anything else,
/// including dashed ISO timestamps, gets a best-effort parse.
pub fn parse_ics_date(value: &str) -> Result<NaiveDateTime, CalendarError> {
    let invalid = || CalendarError::InvalidDateTime(value.to_string());

    if value.chars().count() == 8 {
        return parse_compact_date(value)
            .map(|d| d.and_time(NaiveTime::MIN))
            .ok_or_else(invalid);
    }

    if value.contains('T') {
        let date = value.get(0..8).and_then(parse_compact_date);
        let time = value.get(9..15).and_then(parse_compact_time);
        if let (Some(d), Some(t)) = (date, time) {
            return Ok(d.and_time(t));
        }
    }

    parse_generic_date(value).ok_or_else(invalid)
}

fn digits(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn parse_compact_date(s: &str) -> Option<NaiveDate> {
    let year = digits(s.get(0..4)?)?;
    let month = digits(s.get(4..6)?)?;
    let day = digits(s.get(6..8)?)?;
    NaiveDate::from_ymd_opt(year as i32, month, day)
}

fn parse_compact_time(s: &str) -> Option<NaiveTime> {
    let hour = digits(s.get(0..2)?)?;
    let minute = digits(s.get(2..4)?)?;
    let second = digits(s.get(4..6)?)?;
    NaiveTime::from_hms_opt(hour, minute, second)
}

fn parse_generic_date(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local());
    }
    const FORMATS: [&str; 4] =
        ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"];
    for format in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}
