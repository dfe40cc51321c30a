use crate::calendar::{self, Event};
use crate::cli::{Commands, ConfigActions};
use crate::config::Config;
use crate::feed_diff::{self, DiffVerdict, RefreshDecision};
use crate::patterns::{self, WeeklyPattern};
use crate::schedule::{self, BreakSlot, DaySchedule, EventProgress};
use crate::state::SnapshotStore;
use anyhow::{Context, Result};
use chrono::{Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

pub struct Application {
    config: Config,
    config_path: PathBuf,
}

impl Application {
    pub fn new(config: Config, config_path: PathBuf) -> Self {
        Self { config, config_path }
    }

    pub fn run(&self, command: Commands) -> Result<()> {
        debug!("Running command: {:?}", command);
        match command {
            Commands::Events { file } => self.list_events(&file),
            Commands::Patterns { file, from, days, json } => self.show_patterns(&file, from, days, json),
            Commands::Day { file, date, now, json } => self.show_day(&file, date, now, json),
            Commands::Week { file, from } => self.show_week(&file, from),
            Commands::Overview { file, json } => show_overview(&file, json),
            Commands::Diff { old, new, json } => show_diff(&old, &new, json),
            Commands::Check { file, reset } => self.check_feed(&file, reset),
            Commands::Config { action } => self.handle_config(action),
        }
    }

    fn list_events(&self, file: &Path) -> Result<()> {
        let events = read_events(file)?;
        println!("{} events:", events.len());
        for event in &events {
            let when = match event.start {
                Some(start) => format!("{} {}", start.format("%a %d %b %Y"), self.format_time(event)),
                None => "(no start)".to_string(),
            };
            println!("  {}{}", self.highlight_marker(event), describe(event, &when));
        }
        Ok(())
    }

    fn show_patterns(&self, file: &Path, from: Option<NaiveDate>, days: Option<u32>, json: bool) -> Result<()> {
        let events = read_events(file)?;
        let start = from.map(|d| d.and_time(NaiveTime::MIN)).unwrap_or_else(now);
        let (window_start, window_end) = pattern_window(start, days.or(self.config.analysis.window_days))?;
        info!("Pattern window: {} to {}", window_start, window_end);

        let found = patterns::detect_patterns(&events, window_start, window_end);
        if json {
            println!("{}", serde_json::to_string_pretty(&found)?);
            return Ok(());
        }
        if found.is_empty() {
            println!("No weekly patterns between {} and {}", window_start.date(), window_end.date());
            return Ok(());
        }
        for pattern in &found {
            print_pattern(pattern);
        }
        Ok(())
    }

    fn show_day(&self, file: &Path, date: Option<NaiveDate>, at: Option<NaiveDateTime>, json: bool) -> Result<()> {
        let events = read_events(file)?;
        let now = at.unwrap_or_else(now);
        let date = date.unwrap_or(now.date());
        let day_events = schedule::events_on(&events, date);
        let day = schedule::analyze_day(&day_events, now);

        if json {
            println!("{}", serde_json::to_string_pretty(&day)?);
            return Ok(());
        }
        println!("{} [{} events]", date.format("%A %d %B %Y"), day_events.len());
        self.print_day(&day_events, &day, now);
        Ok(())
    }

    fn show_week(&self, file: &Path, from: Option<NaiveDate>) -> Result<()> {
        let events = read_events(file)?;
        let now = now();
        let today = from.unwrap_or(now.date());
        let week = schedule::week_ahead(&events, today);
        if week.is_empty() {
            println!("No events in the seven days from {}", today);
            return Ok(());
        }
        for day in &week {
            let is_today = day.date == now.date();
            println!(
                "\n{} [{} events]{}",
                day.date.format("%A %d %b"),
                day.events.len(),
                if is_today { " TODAY" } else { "" }
            );
            if is_today {
                self.print_day(&day.events, &schedule::analyze_day(&day.events, now), now);
            } else {
                let breaks = schedule::find_breaks(&day.events);
                self.print_day(&day.events, &DaySchedule { breaks, ..Default::default() }, now);
            }
        }
        Ok(())
    }

    fn check_feed(&self, file: &Path, reset: bool) -> Result<()> {
        let content = read_feed(file)?;
        let store = SnapshotStore::new()?;
        if reset {
            store.clear()?;
            info!("Cleared stored snapshot {}", store.snapshot_path().display());
        }
        let decision = refresh_snapshot(&store, &content)?;

        match &decision {
            RefreshDecision::Initial => println!("First check: snapshot stored"),
            RefreshDecision::Unchanged => println!("No changes"),
            RefreshDecision::MetadataOnly(verdict) => {
                println!("Metadata-only changes, no refresh needed");
                print_verdict(verdict);
            }
            RefreshDecision::Refresh(verdict) => {
                println!("Calendar changed");
                print_verdict(verdict);
            }
        }

        if decision.needs_refresh() {
            let events = calendar::load_feed(&content)?;
            let (from, to) = patterns::default_window(now());
            let found = patterns::detect_patterns(&events, from, to);
            println!("{} events, {} weekly patterns", events.len(), found.len());
        }
        Ok(())
    }

    fn handle_config(&self, action: ConfigActions) -> Result<()> {
        match action {
            ConfigActions::Show => print!("{}", toml::to_string_pretty(&self.config)?),
            ConfigActions::Path => println!("{}", self.config_path.display()),
            ConfigActions::Reset => {
                Config::default().save_to(&self.config_path)?;
                println!("Configuration reset: {}", self.config_path.display());
            }
        }
        Ok(())
    }

    fn print_day(&self, events: &[Event], day: &DaySchedule, now: NaiveDateTime) {
        for event in events {
            let marker = match schedule::event_progress(event, now) {
                Some(EventProgress::Done) => "-",
                _ if day.current.as_ref() == Some(event) => ">",
                _ if day.next.as_ref() == Some(event) => "*",
                _ => " ",
            };
            let countdown = match &day.upcoming {
                Some(up) if &up.event == event => {
                    up.minutes_until.map(|m| format!(" (in {}min)", m)).unwrap_or_default()
                }
                _ => String::new(),
            };
            println!(
                "  {} {}{}{}",
                marker,
                self.highlight_marker(event),
                describe(event, &self.format_time(event)),
                countdown
            );
        }
        for slot in &day.breaks {
            print_break(slot);
        }
    }

    /// `HH:MM-HH:MM` with the configured offset applied and marked.
    fn format_time(&self, event: &Event) -> String {
        let shifted = self.config.time_offset.apply(event);
        let Some(start) = shifted.start else {
            return String::new();
        };
        let mut time = start.format("%H:%M").to_string();
        if let Some(end) = shifted.end {
            time.push_str(&format!("-{}", end.format("%H:%M")));
        }
        if let Some(label) = self.config.time_offset.offset_label(event) {
            time.push_str(&format!(" {}", label));
        }
        time
    }

    fn highlight_marker(&self, event: &Event) -> &'static str {
        if self.config.highlight.matches(event) { "! " } else { "" }
    }
}

/// Analysis window starting at `start`: `days` long, or one month when unset.
pub fn pattern_window(start: NaiveDateTime, days: Option<u32>) -> Result<(NaiveDateTime, NaiveDateTime)> {
    let Some(days) = days else {
        return Ok(patterns::default_window(start));
    };
    let end = Duration::try_days(days as i64)
        .and_then(|d| start.checked_add_signed(d))
        .with_context(|| format!("A {} day window from {} is out of range", days, start.date()))?;
    Ok((start, end))
}

/// Compare `content` with the stored snapshot, then replace the snapshot.
pub fn refresh_snapshot(store: &SnapshotStore, content: &str) -> Result<RefreshDecision> {
    let previous = store.load()?;
    let decision = feed_diff::check_refresh(previous.as_deref(), content);
    store.save(content)?;
    debug!("Refresh decision: {:?}", decision);
    Ok(decision)
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn read_feed(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read feed {}", path.display()))
}

fn read_events(path: &Path) -> Result<Vec<Event>> {
    let content = read_feed(path)?;
    let events = calendar::load_feed(&content)
        .with_context(|| format!("No usable calendar in {}", path.display()))?;
    info!("Loaded {} events from {}", events.len(), path.display());
    Ok(events)
}

fn describe(event: &Event, when: &str) -> String {
    match &event.location {
        Some(location) => format!("{} {} @ {}", when, event.name(), location),
        None => format!("{} {}", when, event.name()),
    }
}

fn print_pattern(pattern: &WeeklyPattern) {
    let location = pattern.location.as_deref().map(|l| format!(" @ {}", l)).unwrap_or_default();
    println!(
        "{}{}: {} on {} at {} ({} times, {:.0}% consistent, {} to {})",
        pattern.name,
        location,
        pattern.classification,
        pattern.day_of_week,
        pattern.time_of_day.format("%H:%M"),
        pattern.occurrence_count,
        pattern.consistency * 100.0,
        pattern.first_date.format("%d %b"),
        pattern.last_date.format("%d %b %Y"),
    );
    for gap in &pattern.gaps {
        println!("    skips {} week(s) after {}", gap.missed_weeks, gap.after_date.format("%d %b"));
    }
}

fn print_break(slot: &BreakSlot) {
    println!(
        "     {} {} ({} min){}",
        slot.time_range(),
        slot.kind,
        slot.duration_minutes,
        if slot.is_short { " short" } else { "" }
    );
}

fn print_verdict(verdict: &DiffVerdict) {
    let c = &verdict.counters;
    println!("  timestamp changes:  {}", c.timestamp_changes);
    println!("  sequence changes:   {}", c.sequence_changes);
    println!("  uid changes:        {}", c.id_changes);
    println!("  line count changes: {}", c.line_count_changes);
    println!("  content changes:    {}", c.content_changes);
    if verdict.truncated {
        println!("  (stopped after {} differing lines)", verdict.lines_inspected);
    }
}

fn show_overview(file: &Path, json: bool) -> Result<()> {
    let events = read_events(file)?;
    let overview = patterns::summarize(&events);
    if json {
        println!("{}", serde_json::to_string_pretty(&overview)?);
        return Ok(());
    }
    println!("total events:     {}", overview.total_events);
    println!("unique names:     {}", overview.unique_names);
    println!("locations:        {}", overview.unique_locations);
    println!("recurring (RRULE): {}", overview.recurring_events.len());
    if let Some((first, last)) = overview.date_range {
        println!("date range:       {} to {}", first.date(), last.date());
    }
    println!("shared time slots: {}", overview.time_slots.len());
    for slot in overview.time_slots.iter().take(10) {
        println!(
            "  {} {} [{} events]",
            slot.day_of_week,
            slot.time_of_day.format("%H:%M"),
            slot.events.len()
        );
    }
    Ok(())
}

fn show_diff(old: &Path, new: &Path, json: bool) -> Result<()> {
    let verdict = feed_diff::classify_diff(&read_feed(old)?, &read_feed(new)?);
    if json {
        println!("{}", serde_json::to_string_pretty(&verdict)?);
        return Ok(());
    }
    if verdict.identical {
        println!("identical");
    } else if verdict.significant {
        println!("significant changes");
    } else {
        println!("metadata-only changes");
    }
    if !verdict.identical {
        print_verdict(&verdict);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 6).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    fn app() -> Application {
        Application::new(Config::default(), PathBuf::from("config.toml"))
    }

    #[test]
    fn test_format_time_applies_offset() {
        let lecture = Event {
            summary: Some("Lecture Algebra".to_string()),
            start: Some(at(9, 0)),
            end: Some(at(10, 30)),
            ..Default::default()
        };
        assert_eq!(app().format_time(&lecture), "09:00-10:15 (-15m)");

        let lab = Event { summary: Some("Lab".to_string()), ..lecture.clone() };
        assert_eq!(app().format_time(&lab), "09:00-10:30");
    }

    #[test]
    fn test_highlight_marker() {
        let exam = Event { summary: Some("Final Exam".to_string()), ..Default::default() };
        assert_eq!(app().highlight_marker(&exam), "! ");
        assert_eq!(app().highlight_marker(&Event::default()), "");
    }

    #[test]
    fn test_pattern_window() -> Result<()> {
        assert_eq!(pattern_window(at(9, 0), Some(14))?, (at(9, 0), at(9, 0) + Duration::days(14)));
        assert_eq!(pattern_window(at(9, 0), None)?, patterns::default_window(at(9, 0)));
        assert!(pattern_window(at(9, 0), Some(u32::MAX)).is_err());
        Ok(())
    }

    #[test]
    fn test_refresh_snapshot_sequence() -> Result<()> {
        let temp_dir = tempdir()?;
        let store = SnapshotStore::with_dir(temp_dir.path())?;
        let feed = "BEGIN:VEVENT\nDTSTAMP:1\nSUMMARY:A\nEND:VEVENT";

        assert_eq!(refresh_snapshot(&store, feed)?, RefreshDecision::Initial);
        assert_eq!(refresh_snapshot(&store, feed)?, RefreshDecision::Unchanged);

        let stamped = feed.replace("DTSTAMP:1", "DTSTAMP:2");
        assert!(matches!(refresh_snapshot(&store, &stamped)?, RefreshDecision::MetadataOnly(_)));

        let edited = stamped.replace("SUMMARY:A", "SUMMARY:B");
        assert!(refresh_snapshot(&store, &edited)?.needs_refresh());
        assert_eq!(store.load()?.as_deref(), Some(edited.as_str()));

        store.clear()?;
        assert_eq!(refresh_snapshot(&store, &edited)?, RefreshDecision::Initial);

        Ok(())
    }
}
