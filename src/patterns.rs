//! Weekly recurrence detection.
//!
//! Patterns are inferred from observed event instances rather than from RRULE
//! values: events are grouped by name and location, then by weekday and time of
//! day, and each group's spacing is scored for weekly regularity.
//!
//! Every call recomputes its result from scratch; nothing is cached between
//! passes and the input slice is never reordered.

use crate::calendar::Event;
use chrono::{Datelike, Months, NaiveDateTime, NaiveTime, Weekday};
use log::{debug, info};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::hash::Hash;

/// Minimum events sharing a name and location before they are examined.
pub const MIN_GROUP_SIZE: usize = 2;
/// Minimum observations in one weekday/time slot for a credible pattern.
pub const MIN_OCCURRENCES: usize = 3;
/// Share of gaps that must match the modal interval.
pub const CONSISTENCY_FLOOR: f64 = 0.6;
/// Extra days beyond one week before a missed occurrence is reported.
const GAP_TOLERANCE_DAYS: i64 = 10;

/// How regularly a slot recurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecurrenceClass {
    Weekly,
    MostlyWeekly,
    BiWeekly,
    EveryNWeeks(u32),
    Irregular,
}

impl fmt::Display for RecurrenceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecurrenceClass::Weekly => write!(f, "weekly"),
            RecurrenceClass::MostlyWeekly => write!(f, "mostly weekly"),
            RecurrenceClass::BiWeekly => write!(f, "bi-weekly"),
            RecurrenceClass::EveryNWeeks(n) => write!(f, "every {} weeks", n),
            RecurrenceClass::Irregular => write!(f, "irregular"),
        }
    }
}

impl Serialize for RecurrenceClass {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Weeks skipped between two observations of a weekly slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternGap {
    pub after_date: NaiveDateTime,
    pub missed_weeks: i64,
}

/// Spacing statistics for one sorted list of observations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecurrenceStats {
    /// Most common distance between consecutive observations, in weeks.
    pub interval_weeks: i64,
    pub consistency: f64,
    /// Observations per spanned week.
    pub frequency: f64,
    pub classification: RecurrenceClass,
    pub gaps: Vec<PatternGap>,
}

impl RecurrenceStats {
    pub fn is_weekly_pattern(&self) -> bool {
        self.interval_weeks >= 1 && self.consistency >= CONSISTENCY_FLOOR
    }
}

/// A recurring weekday/time slot for one (name, location) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyPattern {
    pub name: String,
    pub location: Option<String>,
    pub day_of_week: Weekday,
    pub time_of_day: NaiveTime,
    pub occurrence_count: usize,
    pub consistency: f64,
    pub frequency: f64,
    pub classification: RecurrenceClass,
    pub interval_weeks: u32,
    pub first_date: NaiveDateTime,
    pub last_date: NaiveDateTime,
    pub source_events: Vec<Event>,
    pub gaps: Vec<PatternGap>,
}

impl WeeklyPattern {
    /// Ranking score: consistency weighted by how often the slot was seen.
    pub fn score(&self) -> f64 {
        self.consistency * self.occurrence_count as f64
    }
}

/// Window used when the caller has no preference: `now` to one month later.
pub fn default_window(now: NaiveDateTime) -> (NaiveDateTime, NaiveDateTime) {
    let end = now
        .checked_add_months(Months::new(1))
        .unwrap_or(NaiveDateTime::MAX);
    (now, end)
}

/// Group items by key, keeping groups and members in encounter order.
fn group_in_order<'a, K, F>(events: impl IntoIterator<Item = &'a Event>, key_of: F) -> Vec<(K, Vec<&'a Event>)>
where
    K: Eq + Hash + Clone,
    F: Fn(&Event) -> Option<K>,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<(K, Vec<&'a Event>)> = Vec::new();
    for event in events {
        let Some(key) = key_of(event) else { continue };
        match index.get(&key) {
            Some(&i) => groups[i].1.push(event),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, vec![event]));
            }
        }
    }
    groups
}

fn slot_key(event: &Event) -> Option<(Weekday, NaiveTime)> {
    Some((event.start?.weekday(), event.start_time_of_day()?))
}

fn weeks_between(from: NaiveDateTime, to: NaiveDateTime) -> i64 {
    let days = (to.date() - from.date()).num_days();
    (days as f64 / 7.0).round() as i64
}

fn classify(interval_weeks: i64, consistency: f64) -> RecurrenceClass {
    if interval_weeks < 1 || consistency < CONSISTENCY_FLOOR {
        return RecurrenceClass::Irregular;
    }
    match interval_weeks {
        1 if consistency >= 0.9 => RecurrenceClass::Weekly,
        2 if consistency >= 0.8 => RecurrenceClass::BiWeekly,
        1 => RecurrenceClass::MostlyWeekly,
        n => RecurrenceClass::EveryNWeeks(n as u32),
    }
}

/// Score the spacing of a list of observation timestamps.
///
/// Returns `None` with fewer than [`MIN_OCCURRENCES`] observations. Gaps are
/// scanned whenever the modal interval is one week, whether or not the
/// consistency clears the floor.
pub fn weekly_consistency(starts: &[NaiveDateTime]) -> Option<RecurrenceStats> {
    if starts.len() < MIN_OCCURRENCES {
        return None;
    }
    let mut sorted = starts.to_vec();
    sorted.sort();

    let week_diffs: Vec<i64> = sorted.windows(2).map(|w| weeks_between(w[0], w[1])).collect();

    // BTreeMap keeps intervals ascending so a tied count resolves to the shorter interval.
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for diff in &week_diffs {
        *counts.entry(*diff).or_insert(0) += 1;
    }
    let (interval_weeks, mode_count) = counts
        .iter()
        .fold((0, 0), |best, (&weeks, &count)| if count > best.1 { (weeks, count) } else { best });

    let consistency = mode_count as f64 / week_diffs.len() as f64;

    let first = sorted[0];
    let last = sorted[sorted.len() - 1];
    let span_days = (last.date() - first.date()).num_days();
    let total_weeks = ((span_days as f64) / 7.0).ceil().max(1.0);
    let frequency = sorted.len() as f64 / total_weeks;

    let mut gaps = Vec::new();
    if interval_weeks == 1 {
        for pair in sorted.windows(2) {
            let actual_days = (pair[1].date() - pair[0].date()).num_days();
            if actual_days - 7 > GAP_TOLERANCE_DAYS {
                gaps.push(PatternGap {
                    after_date: pair[0],
                    missed_weeks: (actual_days as f64 / 7.0).round() as i64 - 1,
                });
            }
        }
    }

    Some(RecurrenceStats {
        interval_weeks,
        consistency,
        frequency,
        classification: classify(interval_weeks, consistency),
        gaps,
    })
}

/// Detect weekly patterns among events starting inside `[window_start, window_end]`.
///
/// The result is ordered by [`WeeklyPattern::score`], highest first; equal
/// scores keep the order in which their groups were first encountered.
pub fn detect_patterns(
    events: &[Event],
    window_start: NaiveDateTime,
    window_end: NaiveDateTime,
) -> Vec<WeeklyPattern> {
    let in_window = events
        .iter()
        .filter(|e| matches!(e.start, Some(s) if s >= window_start && s <= window_end));

    let groups = group_in_order(in_window, |e| {
        e.start?;
        Some((e.name().to_string(), e.location.clone()))
    });

    let mut patterns = Vec::new();
    for ((name, location), mut members) in groups {
        if members.len() < MIN_GROUP_SIZE {
            continue;
        }
        members.sort_by_key(|e| e.start);

        for ((day_of_week, time_of_day), slot_events) in group_in_order(members, slot_key) {
            if slot_events.len() < MIN_OCCURRENCES {
                debug!(
                    "Skipping {} on {:?} {}: only {} occurrences",
                    name,
                    day_of_week,
                    time_of_day.format("%H:%M"),
                    slot_events.len()
                );
                continue;
            }
            let starts: Vec<NaiveDateTime> = slot_events.iter().filter_map(|e| e.start).collect();
            let Some(stats) = weekly_consistency(&starts) else { continue };
            if !stats.is_weekly_pattern() {
                debug!("{} on {:?} is irregular ({:.2})", name, day_of_week, stats.consistency);
                continue;
            }

            patterns.push(WeeklyPattern {
                name: name.clone(),
                location: location.clone(),
                day_of_week,
                time_of_day,
                occurrence_count: slot_events.len(),
                consistency: stats.consistency,
                frequency: stats.frequency,
                classification: stats.classification,
                interval_weeks: stats.interval_weeks as u32,
                first_date: starts[0],
                last_date: starts[starts.len() - 1],
                source_events: slot_events.into_iter().cloned().collect(),
                gaps: stats.gaps,
            });
        }
    }

    // sort_by is stable, so ties stay in encounter order.
    patterns.sort_by(|a, b| b.score().total_cmp(&a.score()));
    info!("Detected {} weekly patterns", patterns.len());
    patterns
}

/// Events sharing a weekday and start time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSlot {
    pub day_of_week: Weekday,
    pub time_of_day: NaiveTime,
    pub events: Vec<Event>,
}

/// Feed-level statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedOverview {
    pub total_events: usize,
    pub unique_names: usize,
    pub unique_locations: usize,
    pub date_range: Option<(NaiveDateTime, NaiveDateTime)>,
    pub recurring_events: Vec<Event>,
    /// Weekday/time slots holding more than one event, busiest first.
    pub time_slots: Vec<TimeSlot>,
}

pub fn summarize(events: &[Event]) -> FeedOverview {
    let dated: Vec<&Event> = events.iter().filter(|e| e.start.is_some()).collect();

    let unique_names: HashSet<&str> = dated.iter().map(|e| e.name()).collect();
    let unique_locations: HashSet<&str> =
        dated.iter().filter_map(|e| e.location.as_deref()).collect();

    let starts = dated.iter().filter_map(|e| e.start);
    let date_range = starts.clone().min().zip(starts.max());

    let mut time_slots: Vec<TimeSlot> = group_in_order(dated.iter().copied(), slot_key)
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .map(|((day_of_week, time_of_day), members)| TimeSlot {
            day_of_week,
            time_of_day,
            events: members.into_iter().cloned().collect(),
        })
        .collect();
    time_slots.sort_by(|a, b| b.events.len().cmp(&a.events.len()));

    FeedOverview {
        total_events: events.len(),
        unique_names: unique_names.len(),
        unique_locations: unique_locations.len(),
        date_range,
        recurring_events: dated.iter().filter(|e| e.is_recurring()).map(|e| (*e).clone()).collect(),
        time_slots,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    // 2024-01-01 is a Monday.
    fn monday(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1).and_then(|d| d.and_hms_opt(h, m, 0)).unwrap()
    }

    fn series(name: &str, location: Option<&str>, first: NaiveDateTime, offsets: &[i64]) -> Vec<Event> {
        offsets
            .iter()
            .map(|days| Event {
                summary: Some(name.to_string()),
                start: Some(first + Duration::days(*days)),
                end: Some(first + Duration::days(*days) + Duration::minutes(90)),
                location: location.map(str::to_string),
                ..Default::default()
            })
            .collect()
    }

    fn window() -> (NaiveDateTime, NaiveDateTime) {
        (monday(0, 0), monday(0, 0) + Duration::days(120))
    }

    #[test]
    fn test_three_weekly_events_form_a_pattern() {
        let events = series("Algorithms", Some("H1"), monday(10, 0), &[0, 7, 14]);
        let (from, to) = window();
        let patterns = detect_patterns(&events, from, to);

        assert_eq!(patterns.len(), 1);
        let p = &patterns[0];
        assert_eq!(p.name, "Algorithms");
        assert_eq!(p.location.as_deref(), Some("H1"));
        assert_eq!(p.day_of_week, Weekday::Mon);
        assert_eq!(p.time_of_day, NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        assert_eq!(p.occurrence_count, 3);
        assert_eq!(p.consistency, 1.0);
        assert_eq!(p.classification, RecurrenceClass::Weekly);
        assert_eq!(p.interval_weeks, 1);
        assert_eq!(p.first_date, monday(10, 0));
        assert_eq!(p.last_date, monday(10, 0) + Duration::days(14));
        assert_eq!(p.source_events, events);
        assert!(p.gaps.is_empty());
    }

    #[test]
    fn test_three_week_spacing_records_missed_weeks() {
        let starts = [monday(10, 0), monday(10, 0) + Duration::days(7), monday(10, 0) + Duration::days(28)];
        let stats = weekly_consistency(&starts).unwrap();

        assert!(stats.consistency < 1.0);
        assert_eq!(stats.interval_weeks, 1);
        assert_eq!(
            stats.gaps,
            vec![PatternGap { after_date: starts[1], missed_weeks: 2 }]
        );
        // Half of the gaps match, which is under the floor.
        assert_eq!(stats.classification, RecurrenceClass::Irregular);

        let events = series("Lab", None, monday(10, 0), &[0, 7, 28]);
        let (from, to) = window();
        assert!(detect_patterns(&events, from, to).is_empty());
    }

    #[test]
    fn test_mostly_weekly_keeps_gap() {
        let events = series("Lab", None, monday(14, 0), &[0, 7, 14, 35]);
        let (from, to) = window();
        let patterns = detect_patterns(&events, from, to);

        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].classification, RecurrenceClass::MostlyWeekly);
        assert_eq!(patterns[0].location, None);
        assert_eq!(
            patterns[0].gaps,
            vec![PatternGap { after_date: monday(14, 0) + Duration::days(14), missed_weeks: 2 }]
        );
    }

    #[test]
    fn test_two_occurrences_are_below_the_floor() {
        let events = series("Seminar", Some("S2"), monday(12, 0), &[0, 7]);
        let (from, to) = window();
        assert!(detect_patterns(&events, from, to).is_empty());
        assert_eq!(weekly_consistency(&[monday(12, 0), monday(12, 0)]), None);
    }

    #[test_case(&[0, 14, 28], RecurrenceClass::BiWeekly ; "bi weekly")]
    #[test_case(&[0, 21, 42], RecurrenceClass::EveryNWeeks(3) ; "every three weeks")]
    #[test_case(&[0, 7, 14, 21, 28, 35, 42, 49, 56, 63, 77], RecurrenceClass::Weekly ; "one gap in ten")]
    #[test_case(&[0, 14, 28, 35], RecurrenceClass::EveryNWeeks(2) ; "bi weekly below 0.8")]
    fn test_classification(offsets: &[i64], expected: RecurrenceClass) {
        let events = series("Course", None, monday(8, 15), offsets);
        let (from, to) = window();
        let patterns = detect_patterns(&events, from, to);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].classification, expected);
    }

    #[test]
    fn test_irregular_slots_are_excluded() {
        let events = series("Club", None, monday(18, 0), &[0, 7, 21, 42]);
        let (from, to) = window();
        assert!(detect_patterns(&events, from, to).is_empty());
    }

    #[test]
    fn test_events_outside_window_are_ignored() {
        let events = series("Algorithms", None, monday(10, 0), &[0, 7, 14, 21]);
        let from = monday(10, 0) + Duration::days(1);
        let patterns = detect_patterns(&events, from, from + Duration::days(60));
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].occurrence_count, 3);
        assert_eq!(patterns[0].first_date, monday(10, 0) + Duration::days(7));
    }

    #[test]
    fn test_window_end_is_inclusive() {
        let events = series("Algorithms", None, monday(10, 0), &[0, 7, 14, 21]);
        let from = monday(10, 0);
        let patterns = detect_patterns(&events, from, from + Duration::days(14));
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].occurrence_count, 3);
        assert_eq!(patterns[0].last_date, from + Duration::days(14));
    }

    #[test]
    fn test_location_splits_groups() {
        let mut events = series("Tutorial", Some("A"), monday(9, 0), &[0, 7]);
        events.extend(series("Tutorial", Some("B"), monday(9, 0), &[14, 21]));
        let (from, to) = window();
        assert!(detect_patterns(&events, from, to).is_empty());
    }

    #[test]
    fn test_patterns_ranked_by_score_with_stable_ties() {
        let mut events = series("Short", None, monday(8, 0), &[0, 7, 14]);
        events.extend(series("Also short", None, monday(11, 0), &[0, 7, 14]));
        events.extend(series("Long", None, monday(16, 0), &[0, 7, 14, 21, 28]));
        let (from, to) = window();

        let names: Vec<String> = detect_patterns(&events, from, to).into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Long", "Short", "Also short"]);
    }

    #[test]
    fn test_input_order_is_untouched() {
        let mut events = series("Algorithms", None, monday(10, 0), &[0, 7, 14]);
        events.reverse();
        let before = events.clone();
        let (from, to) = window();
        let patterns = detect_patterns(&events, from, to);
        assert_eq!(events, before);
        assert_eq!(patterns[0].first_date, monday(10, 0));
    }

    #[test]
    fn test_default_window_spans_one_month() {
        let now = monday(12, 0);
        let (from, to) = default_window(now);
        assert_eq!(from, now);
        assert_eq!(to.date(), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    }

    #[test]
    fn test_summarize() {
        let mut events = series("Algorithms", Some("H1"), monday(10, 0), &[0, 7]);
        events.push(Event {
            summary: Some("Standup".to_string()),
            start: Some(monday(10, 0) + Duration::days(14)),
            recurrence_rule: Some("FREQ=DAILY".to_string()),
            ..Default::default()
        });
        events.push(Event { summary: Some("Undated".to_string()), ..Default::default() });

        let overview = summarize(&events);
        assert_eq!(overview.total_events, 4);
        assert_eq!(overview.unique_names, 2);
        assert_eq!(overview.unique_locations, 1);
        assert_eq!(
            overview.date_range,
            Some((monday(10, 0), monday(10, 0) + Duration::days(14)))
        );
        assert_eq!(overview.recurring_events.len(), 1);
        assert_eq!(overview.time_slots.len(), 1);
        assert_eq!(overview.time_slots[0].events.len(), 3);
        assert_eq!(RecurrenceClass::EveryNWeeks(4).to_string(), "every 4 weeks");
    }
}
