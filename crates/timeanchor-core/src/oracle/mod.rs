//! Scoring oracle contract.
//!
//! The oracle is an external evaluator (a language model in production)
//! asked how well a task fits a slot given the events around it. The core
//! only sees this narrow request/response pair.

pub mod http;

pub use http::HttpOracle;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::CalendarEvent;
use crate::error::OracleError;
use crate::task::{EnergyZone, Priority, TaskToAnchor, TimeBlock};
use crate::timeline::{AvailableSlot, GapSize, GapType};

/// Task attributes sent to the oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub priority: Priority,
    pub estimated_minutes: i64,
    pub preferred_block: Option<TimeBlock>,
    pub energy_zone: Option<EnergyZone>,
}

impl From<&TaskToAnchor> for TaskSummary {
    fn from(task: &TaskToAnchor) -> Self {
        Self {
            id: task.id.clone(),
            title: task.title.clone(),
            description: task.description.clone(),
            category: task.category.clone(),
            priority: task.priority,
            estimated_minutes: task.estimated_minutes,
            preferred_block: task.preferred_block,
            energy_zone: task.energy_zone,
        }
    }
}

/// Slot attributes sent to the oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotSummary {
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub gap_type: GapType,
    pub size: GapSize,
}

impl From<&AvailableSlot> for SlotSummary {
    fn from(slot: &AvailableSlot) -> Self {
        Self {
            id: slot.id.clone(),
            start_time: slot.start_time,
            end_time: slot.end_time,
            duration_minutes: slot.duration_minutes(),
            gap_type: slot.gap_type,
            size: slot.size,
        }
    }
}

/// Which side of the slot an adjacent event sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Adjacency {
    Before,
    After,
}

/// A neighbouring calendar event, for sequencing context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSummary {
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub adjacency: Adjacency,
}

/// Everything the oracle gets to see about one pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleRequest {
    pub task: TaskSummary,
    pub slot: SlotSummary,
    pub adjacent_events: Vec<EventSummary>,
}

impl OracleRequest {
    pub fn new(task: &TaskToAnchor, slot: &AvailableSlot, context: &[&CalendarEvent]) -> Self {
        let adjacent_events = context
            .iter()
            .map(|event| EventSummary {
                title: event.title.clone(),
                start_time: event.start_time,
                end_time: event.end_time,
                adjacency: if event.end_time <= slot.start_time {
                    Adjacency::Before
                } else {
                    Adjacency::After
                },
            })
            .collect();

        Self {
            task: task.into(),
            slot: slot.into(),
            adjacent_events,
        }
    }
}

/// Raw oracle verdict, before bounds are enforced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleResponse {
    pub task_context: f64,
    pub dependency_flow: f64,
    pub energy_focus: f64,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub model_id: String,
}

/// External semantic evaluator.
#[async_trait]
pub trait ScoringOracle: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    async fn evaluate(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_request_marks_adjacency() {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
        let slot = AvailableSlot {
            id: "slot-01".into(),
            start_time: start,
            end_time: start + Duration::minutes(60),
            gap_type: GapType::BetweenMeetings,
            size: GapSize::Medium,
            preceding_event_id: Some("a".into()),
            following_event_id: Some("b".into()),
        };
        let before = CalendarEvent::new("a", "Standup", start - Duration::minutes(15), start);
        let after = CalendarEvent::new(
            "b",
            "Review",
            start + Duration::minutes(60),
            start + Duration::minutes(90),
        );
        let task = TaskToAnchor::new("t1", "Write proposal", 45);

        let request = OracleRequest::new(&task, &slot, &[&before, &after]);
        assert_eq!(request.slot.duration_minutes, 60);
        assert_eq!(request.adjacent_events[0].adjacency, Adjacency::Before);
        assert_eq!(request.adjacent_events[1].adjacency, Adjacency::After);
        assert_eq!(request.task.title, "Write proposal");
    }

    #[test]
    fn test_response_requires_scores() {
        let ok = r#"{"task_context": 8, "dependency_flow": 7.5, "energy_focus": 6}"#;
        let parsed: OracleResponse = serde_json::from_str(ok).unwrap();
        assert_eq!(parsed.dependency_flow, 7.5);
        assert!(parsed.reasoning.is_empty());

        let missing = r#"{"task_context": 8, "energy_focus": 6}"#;
        assert!(serde_json::from_str::<OracleResponse>(missing).is_err());
    }
}
