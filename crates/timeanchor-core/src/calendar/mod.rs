//! Calendar events and the sources that provide them.
//!
//! Events are fixed commitments: they are fetched once per run and never
//! modified by the core. Anything that can produce a list satisfying the
//! [`CalendarEvent`] contract can act as a [`CalendarSource`].

mod synthetic;

pub use synthetic::{CalendarProfile, SyntheticCalendar};

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationError};

/// Read a JSON document from disk.
pub(crate) fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Where an event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    Google,
    Outlook,
    Synthetic,
    #[default]
    Manual,
}

/// A fixed calendar event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub all_day: bool,
    #[serde(default)]
    pub source: EventSource,
}

impl CalendarEvent {
    /// Create a new timed event
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            start_time,
            end_time,
            all_day: false,
            source: EventSource::Manual,
        }
    }

    /// Mark the event as all-day
    pub fn all_day(mut self) -> Self {
        self.all_day = true;
        self
    }

    /// Tag the event with its source
    pub fn with_source(mut self, source: EventSource) -> Self {
        self.source = source;
        self
    }

    /// Get duration in minutes
    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }

    /// Check if this event overlaps with a time range
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_time < end && self.end_time > start
    }

    /// Enforce `start < end` for timed events.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.all_day && self.start_time >= self.end_time {
            return Err(ValidationError::InvalidTimeRange {
                id: self.id.clone(),
                start: self.start_time,
                end: self.end_time,
            });
        }
        Ok(())
    }
}

/// Provider of a user's calendar for one day.
#[async_trait]
pub trait CalendarSource: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    async fn fetch_events(&self, user_id: &str, date: NaiveDate) -> Result<Vec<CalendarEvent>>;
}

/// A calendar backed by a fixed list of events, e.g. loaded from a file.
#[derive(Debug, Clone, Default)]
pub struct StaticCalendar {
    events: Vec<CalendarEvent>,
}

impl StaticCalendar {
    pub fn new(events: Vec<CalendarEvent>) -> Self {
        Self { events }
    }

    /// Load a JSON array of events.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        Ok(Self::new(read_json_file(path)?))
    }
}

#[async_trait]
impl CalendarSource for StaticCalendar {
    fn name(&self) -> &str {
        "static"
    }

    /// Returns every event, regardless of user and date.
    ///
    /// The working window for `date` depends on the configured offset and
    /// may wrap past midnight, so no day cut is made here; the gap finder
    /// clips events to the concrete window.
    async fn fetch_events(&self, _user_id: &str, _date: NaiveDate) -> Result<Vec<CalendarEvent>> {
        Ok(self.events.clone())
    }
}
