//! Calendar feed model and import.

mod calendar_import;
mod calendar_keywords;
mod calendar_types;

pub use calendar_import::*;
pub use calendar_keywords::*;
pub use calendar_types::*;

/// Custom error type for calendar operations
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum CalendarError {
    #[error("calendar empty: the feed contains no events")]
    EmptyCalendar,
    #[error("Invalid date/time format: {0}")]
    InvalidDateTime(String),
}
