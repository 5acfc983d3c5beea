pub mod anchor;
pub mod config;
pub mod gaps;

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use clap::Args;
use timeanchor_core::{AnchorConfig, CalendarProfile, CalendarSource, StaticCalendar, SyntheticCalendar};

pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Where the day's events come from.
#[derive(Args)]
pub struct CalendarArgs {
    /// JSON file with an array of calendar events
    #[arg(long, conflicts_with = "profile")]
    pub events: Option<PathBuf>,
    /// Synthetic calendar profile (light, moderate, heavy)
    #[arg(long)]
    pub profile: Option<CalendarProfile>,
    /// Seed for the synthetic calendar
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
    /// Day to anchor (YYYY-MM-DD), defaults to today
    #[arg(long)]
    pub date: Option<NaiveDate>,
    /// User id passed to the calendar and task sources
    #[arg(long, default_value = "local")]
    pub user: String,
    /// Config file to use instead of the default location
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl CalendarArgs {
    /// Events file if given, otherwise a synthetic calendar (light by default).
    pub fn source(&self, offset: FixedOffset) -> CliResult<Box<dyn CalendarSource>> {
        match &self.events {
            Some(path) => Ok(Box::new(read_file(path, StaticCalendar::from_json_file)?)),
            None => {
                let profile = self.profile.unwrap_or(CalendarProfile::Light);
                Ok(Box::new(SyntheticCalendar::new(profile, self.seed).with_offset(offset)))
            }
        }
    }

    pub fn date_or_today(&self, offset: FixedOffset) -> NaiveDate {
        self.date
            .unwrap_or_else(|| Utc::now().with_timezone(&offset).date_naive())
    }

    pub fn load_config(&self) -> CliResult<AnchorConfig> {
        load_config(self.config.as_deref())
    }
}

pub fn load_config(path: Option<&Path>) -> CliResult<AnchorConfig> {
    let config = match path {
        Some(path) => AnchorConfig::load_from(path)?,
        None => AnchorConfig::load()?,
    };
    Ok(config)
}

/// Run a file loader, naming the path in any error.
pub fn read_file<T>(path: &Path, load: fn(&Path) -> timeanchor_core::Result<T>) -> CliResult<T> {
    load(path).map_err(|e| format!("cannot read {}: {e}", path.display()).into())
}

/// HH:MM in the configured wall-clock offset
pub fn clock(time: DateTime<Utc>, offset: FixedOffset) -> String {
    time.with_timezone(&offset).format("%H:%M").to_string()
}
