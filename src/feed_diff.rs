//! Line-level comparison of two feed snapshots.
//!
//! Calendar servers rewrite housekeeping fields (DTSTAMP, SEQUENCE, UID) on
//! every export, so a byte difference does not mean anything a user would see
//! has changed. The classifier decides whether a refreshed feed needs to be
//! re-analysed.
//!
//! The scan compares lines by position and stops after
//! [`MAX_INSPECTED_DIFFERENCES`] differing lines. This bounds the cost of a
//! check; a content change that only appears after the cap is not detected.

use log::{debug, info};
use serde::Serialize;

/// Differing lines classified before the scan stops.
pub const MAX_INSPECTED_DIFFERENCES: usize = 10;

/// Why a pair of lines differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineChange {
    Timestamp,
    Sequence,
    Identifier,
    LineCount,
    Content,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeCounters {
    pub timestamp_changes: usize,
    pub sequence_changes: usize,
    pub id_changes: usize,
    pub line_count_changes: usize,
    pub content_changes: usize,
}

impl ChangeCounters {
    fn record(&mut self, change: LineChange) {
        match change {
            LineChange::Timestamp => self.timestamp_changes += 1,
            LineChange::Sequence => self.sequence_changes += 1,
            LineChange::Identifier => self.id_changes += 1,
            LineChange::LineCount => self.line_count_changes += 1,
            LineChange::Content => self.content_changes += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.timestamp_changes
            + self.sequence_changes
            + self.id_changes
            + self.line_count_changes
            + self.content_changes
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffVerdict {
    pub identical: bool,
    /// True when at least one visible content line changed.
    pub significant: bool,
    pub counters: ChangeCounters,
    pub lines_inspected: usize,
    /// The scan stopped at the inspection cap.
    pub truncated: bool,
}

/// What the caller should do with a freshly fetched feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum RefreshDecision {
    /// No previous snapshot to compare against.
    Initial,
    Unchanged,
    MetadataOnly(DiffVerdict),
    Refresh(DiffVerdict),
}

impl RefreshDecision {
    /// Whether derived state (events, patterns, schedules) must be rebuilt.
    pub fn needs_refresh(&self) -> bool {
        matches!(self, RefreshDecision::Initial | RefreshDecision::Refresh(_))
    }
}

/// Classify one differing line pair.
pub fn classify_line(old: &str, new: &str) -> LineChange {
    if old.starts_with("DTSTAMP:") || new.starts_with("DTSTAMP:") {
        LineChange::Timestamp
    } else if old.starts_with("SEQUENCE:") || new.starts_with("SEQUENCE:") {
        LineChange::Sequence
    } else if old.contains("UID:") || new.contains("UID:") {
        LineChange::Identifier
    } else if old.is_empty() != new.is_empty() {
        LineChange::LineCount
    } else {
        LineChange::Content
    }
}

/// Compare two raw feed snapshots.
pub fn classify_diff(old_text: &str, new_text: &str) -> DiffVerdict {
    if old_text == new_text {
        debug!("Feed content is byte-for-byte identical");
        return DiffVerdict { identical: true, ..Default::default() };
    }

    let old_lines: Vec<&str> = old_text.split('\n').collect();
    let new_lines: Vec<&str> = new_text.split('\n').collect();
    let max_lines = old_lines.len().max(new_lines.len());
    debug!("Comparing {} old lines with {} new lines", old_lines.len(), new_lines.len());

    let mut verdict = DiffVerdict::default();
    for i in 0..max_lines {
        let old = old_lines.get(i).copied().unwrap_or("");
        let new = new_lines.get(i).copied().unwrap_or("");
        if old == new {
            continue;
        }

        let change = classify_line(old, new);
        debug!("{:?} change on line {}: {:?} -> {:?}", change, i + 1, old, new);
        verdict.counters.record(change);
        verdict.lines_inspected += 1;

        if verdict.lines_inspected >= MAX_INSPECTED_DIFFERENCES {
            verdict.truncated = i + 1 < max_lines;
            if verdict.truncated {
                debug!("Stopping scan with {} lines left unchecked", max_lines - i - 1);
            }
            break;
        }
    }

    verdict.significant = verdict.counters.content_changes > 0;
    info!(
        "Feed diff: {} differences ({} timestamp, {} sequence, {} uid, {} line count, {} content)",
        verdict.counters.total(),
        verdict.counters.timestamp_changes,
        verdict.counters.sequence_changes,
        verdict.counters.id_changes,
        verdict.counters.line_count_changes,
        verdict.counters.content_changes
    );
    if !verdict.significant {
        info!("Changes are metadata only, keeping current view");
    }
    verdict
}

/// Decide whether a new snapshot warrants re-analysis.
///
/// `previous` is the last snapshot the caller stored. Regardless of the
/// decision, the caller should store `current` as the new snapshot.
pub fn check_refresh(previous: Option<&str>, current: &str) -> RefreshDecision {
    let Some(previous) = previous else {
        return RefreshDecision::Initial;
    };
    let verdict = classify_diff(previous, current);
    if verdict.identical {
        RefreshDecision::Unchanged
    } else if verdict.significant {
        RefreshDecision::Refresh(verdict)
    } else {
        RefreshDecision::MetadataOnly(verdict)
    }
}
