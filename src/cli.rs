use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// calpulse - weekly patterns, free time and change detection for iCalendar feeds
#[derive(Debug, Parser)]
#[command(name = "calpulse")]
#[command(about = "Weekly patterns, free time and change detection for iCalendar feeds", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the events parsed from a feed
    Events {
        /// Feed file (.ics)
        file: PathBuf,
    },

    /// Detect weekly recurring patterns
    Patterns {
        /// Feed file (.ics)
        file: PathBuf,

        /// First day of the analysis window (YYYY-MM-DD, default: now)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Window length in days (default: one month)
        #[arg(long)]
        days: Option<u32>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show breaks and the current/next event for one day
    Day {
        /// Feed file (.ics)
        file: PathBuf,

        /// Day to analyse (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Reference time, e.g. "2024-05-06 10:15" (default: now)
        #[arg(long, value_parser = parse_timestamp)]
        now: Option<NaiveDateTime>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show the next seven days with their breaks
    #[command(alias = "next-week")]
    Week {
        /// Feed file (.ics)
        file: PathBuf,

        /// First day to show (YYYY-MM-DD, default: today)
        #[arg(long)]
        from: Option<NaiveDate>,
    },

    /// Summary statistics for a feed
    #[command(alias = "stats")]
    Overview {
        /// Feed file (.ics)
        file: PathBuf,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Classify the difference between two feed snapshots
    Diff {
        /// Previous snapshot
        old: PathBuf,

        /// New snapshot
        new: PathBuf,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Compare a feed with the stored snapshot and store it for next time
    Check {
        /// Freshly fetched feed file (.ics)
        file: PathBuf,

        /// Forget the stored snapshot first
        #[arg(long)]
        reset: bool,
    },

    /// View or reset configuration
    Config {
        #[command(subcommand)]
        action: ConfigActions,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigActions {
    /// Print the active configuration
    Show,
    /// Print the configuration file location
    Path,
    /// Restore default settings
    Reset,
}

fn parse_timestamp(value: &str) -> Result<NaiveDateTime, String> {
    crate::calendar::parse_ics_date(value).map_err(|e| e.to_string())
}
