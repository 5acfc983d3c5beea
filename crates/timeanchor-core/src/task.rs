//! Flexible tasks waiting to be anchored into the day.
//!
//! The mapping from upstream task records into [`TaskToAnchor`] is the
//! caller's job; the core only reads these values.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::read_json_file;
use crate::error::{Result, ValidationError};

/// Task priority level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Sort rank: high before medium before low
    pub fn rank(self) -> u8 {
        match self {
            Self::High => 0,
            Self::Medium => 1,
            Self::Low => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// Time-of-day block a task would rather happen in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeBlock {
    Morning,
    /// Peak focus hours, late morning
    Peak,
    Afternoon,
    Evening,
}

impl TimeBlock {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Peak => "peak",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
        }
    }
}

/// Energy the task demands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyZone {
    High,
    Medium,
    Low,
}

impl EnergyZone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// A flexible task to place into an available slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskToAnchor {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub original_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub original_end: Option<DateTime<Utc>>,
    pub estimated_minutes: i64,
    #[serde(default)]
    pub preferred_block: Option<TimeBlock>,
    #[serde(default)]
    pub energy_zone: Option<EnergyZone>,
}

impl TaskToAnchor {
    /// Create a task with medium priority and no preferences
    pub fn new(id: impl Into<String>, title: impl Into<String>, estimated_minutes: i64) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            category: String::new(),
            priority: Priority::Medium,
            original_start: None,
            original_end: None,
            estimated_minutes,
            preferred_block: None,
            energy_zone: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_preferred_block(mut self, block: TimeBlock) -> Self {
        self.preferred_block = Some(block);
        self
    }

    pub fn with_energy_zone(mut self, zone: EnergyZone) -> Self {
        self.energy_zone = Some(zone);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Record where the upstream plan originally put this task
    pub fn with_original_time(mut self, start: DateTime<Utc>) -> Self {
        self.original_start = Some(start);
        self.original_end = Some(start + Duration::minutes(self.estimated_minutes));
        self
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(self.estimated_minutes)
    }

    /// Enforce a positive duration and an ordered original window.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.estimated_minutes <= 0 {
            return Err(ValidationError::NonPositiveDuration {
                task_id: self.id.clone(),
                minutes: self.estimated_minutes,
            });
        }
        if let (Some(start), Some(end)) = (self.original_start, self.original_end) {
            if start >= end {
                return Err(ValidationError::InvalidTimeRange {
                    id: self.id.clone(),
                    start,
                    end,
                });
            }
        }
        Ok(())
    }
}

/// Provider of the tasks to anchor for one user and day.
#[async_trait]
pub trait TaskSource: Send + Sync {
    fn name(&self) -> &str;

    async fn load_tasks(&self, user_id: &str, date: NaiveDate) -> Result<Vec<TaskToAnchor>>;
}

/// Task source backed by a fixed list.
#[derive(Debug, Clone, Default)]
pub struct StaticTaskSource {
    tasks: Vec<TaskToAnchor>,
}

impl StaticTaskSource {
    pub fn new(tasks: Vec<TaskToAnchor>) -> Self {
        Self { tasks }
    }

    /// Load a JSON array of tasks.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        Ok(Self::new(read_json_file(path)?))
    }
}

#[async_trait]
impl TaskSource for StaticTaskSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn load_tasks(&self, _user_id: &str, _date: NaiveDate) -> Result<Vec<TaskToAnchor>> {
        Ok(self.tasks.clone())
    }
}
