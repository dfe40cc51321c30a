pub mod app;
pub mod calendar;
pub mod cli;
pub mod config;
pub mod feed_diff;
pub mod patterns;
pub mod schedule;
pub mod state;

pub fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Debug)
        .format_timestamp(None)
        .format_target(false)
        .is_test(true)
        .try_init()
        .ok();
}

// Re-export commonly used types
pub use calendar::{CalendarError, Event};
pub use config::Config;
pub use feed_diff::{DiffVerdict, RefreshDecision};
pub use patterns::WeeklyPattern;
pub use schedule::DaySchedule;
