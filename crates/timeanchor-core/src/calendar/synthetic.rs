//! Deterministic synthetic calendars.
//!
//! Stands in for a real calendar provider in demos and regression runs.
//! The same seed, user and date always produce the same day.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use rand::prelude::*;
use rand_pcg::Mcg128Xsl64;
use serde::{Deserialize, Serialize};

use super::{CalendarEvent, CalendarSource, EventSource};
use crate::error::{CoreError, Result};

/// How busy the generated day is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarProfile {
    /// 3-4 events
    Light,
    /// 5-6 events
    Moderate,
    /// 7-9 events
    Heavy,
}

/// (title, hour, minute, duration in minutes)
type Template = (&'static str, u32, u32, i64);

const LIGHT: &[Template] = &[
    ("Daily standup", 9, 0, 15),
    ("1:1 with manager", 11, 0, 30),
    ("Team lunch", 12, 30, 60),
    ("Design review", 15, 0, 45),
    ("Weekly planning", 16, 30, 30),
];

const MODERATE: &[Template] = &[
    ("Daily standup", 9, 0, 15),
    ("Customer call", 10, 0, 45),
    ("1:1 with manager", 11, 30, 30),
    ("Team lunch", 12, 30, 45),
    ("Architecture sync", 14, 0, 60),
    ("Design review", 15, 30, 45),
    ("Hiring debrief", 17, 0, 30),
];

const HEAVY: &[Template] = &[
    ("Daily standup", 9, 0, 15),
    ("Incident review", 9, 30, 45),
    ("Customer call", 10, 30, 30),
    ("1:1 with manager", 11, 15, 30),
    ("Team lunch", 12, 0, 45),
    ("Architecture sync", 13, 0, 60),
    ("Interview", 14, 15, 45),
    ("Design review", 15, 15, 45),
    ("Roadmap planning", 16, 15, 60),
    ("Gym class", 18, 30, 60),
];

impl CalendarProfile {
    fn templates(self) -> &'static [Template] {
        match self {
            Self::Light => LIGHT,
            Self::Moderate => MODERATE,
            Self::Heavy => HEAVY,
        }
    }

    /// Inclusive range of events generated for this profile
    pub fn event_range(self) -> (usize, usize) {
        match self {
            Self::Light => (3, 4),
            Self::Moderate => (5, 6),
            Self::Heavy => (7, 9),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Moderate => "moderate",
            Self::Heavy => "heavy",
        }
    }
}

impl FromStr for CalendarProfile {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "light" => Ok(Self::Light),
            "moderate" => Ok(Self::Moderate),
            "heavy" => Ok(Self::Heavy),
            other => Err(CoreError::Custom(format!("unknown calendar profile: {other}"))),
        }
    }
}

/// Calendar source that fabricates a plausible working day.
#[derive(Debug, Clone)]
pub struct SyntheticCalendar {
    profile: CalendarProfile,
    seed: u64,
    offset: FixedOffset,
}

impl SyntheticCalendar {
    /// Create a generator for `profile` with a fixed seed, in UTC wall-clock
    pub fn new(profile: CalendarProfile, seed: u64) -> Self {
        Self {
            profile,
            seed,
            offset: Utc.fix(),
        }
    }

    /// Interpret template times in the given wall-clock offset
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    /// Generate the events for one user and day.
    pub fn generate(&self, user_id: &str, date: NaiveDate) -> Vec<CalendarEvent> {
        let user_salt = user_id
            .bytes()
            .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
        let mut rng = Mcg128Xsl64::seed_from_u64(
            self.seed ^ user_salt ^ (date.num_days_from_ce() as u64).rotate_left(17),
        );

        let (min, max) = self.profile.event_range();
        let count = rng.gen_range(min..=max);

        let mut picked: Vec<&Template> = self
            .profile
            .templates()
            .choose_multiple(&mut rng, count)
            .collect();
        picked.sort_by_key(|(_, hour, minute, _)| (*hour, *minute));

        picked
            .into_iter()
            .enumerate()
            .filter_map(|(i, (title, hour, minute, duration))| {
                let jitter = Duration::minutes(15 * rng.gen_range(0..=1));
                let time = NaiveTime::from_hms_opt(*hour, *minute, 0)?;
                let local = self.offset.from_local_datetime(&date.and_time(time)).single()?;
                let start = local.with_timezone(&Utc) + jitter;
                Some(
                    CalendarEvent::new(
                        format!("syn-{}-{}", date.format("%Y%m%d"), i + 1),
                        *title,
                        start,
                        start + Duration::minutes(*duration),
                    )
                    .with_source(EventSource::Synthetic),
                )
            })
            .collect()
    }
}

#[async_trait]
impl CalendarSource for SyntheticCalendar {
    fn name(&self) -> &str {
        "synthetic"
    }

    async fn fetch_events(&self, user_id: &str, date: NaiveDate) -> Result<Vec<CalendarEvent>> {
        Ok(self.generate(user_id, date))
    }
}
