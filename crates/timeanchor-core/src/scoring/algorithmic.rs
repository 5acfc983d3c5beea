//! Rubric scoring for a task/slot pair.
//!
//! Three table-driven criteria, 0-5 points each. Pure and O(1) per pair, so
//! it is run exhaustively over every pair of a run.

use crate::scoring::{Criterion, ScoreComponents, TaskSlotScore};
use crate::task::{Priority, TaskToAnchor, TimeBlock};
use crate::timeline::{AvailableSlot, GapSize, GapType};

/// Duration fit (0-5 points).
///
/// Ratio of the shorter to the longer of task and slot duration:
/// - >= 0.95 = 5
/// - >= 0.80 = 4
/// - >= 0.60 = 3
/// - >= 0.40 = 2
/// - >= 0.20 = 1
/// - otherwise 0
pub fn duration_fit_score(task_minutes: i64, slot_minutes: i64) -> f64 {
    debug_assert!(task_minutes > 0, "task duration must be positive");
    debug_assert!(slot_minutes > 0, "slot duration must be positive");
    if task_minutes <= 0 || slot_minutes <= 0 {
        return 0.0;
    }

    let (short, long) = if task_minutes <= slot_minutes {
        (task_minutes, slot_minutes)
    } else {
        (slot_minutes, task_minutes)
    };
    let ratio = short as f64 / long as f64;

    match ratio {
        r if r >= 0.95 => 5.0,
        r if r >= 0.80 => 4.0,
        r if r >= 0.60 => 3.0,
        r if r >= 0.40 => 2.0,
        r if r >= 0.20 => 1.0,
        _ => 0.0,
    }
}

/// Time window match (0-5 points).
///
/// - Preferred block matches the gap type = 5
/// - Neighbouring gap type = 3
/// - No preference = 2
/// - Mismatch = 0
pub fn time_window_score(preferred: Option<TimeBlock>, gap_type: GapType) -> f64 {
    use GapType::*;

    let Some(block) = preferred else {
        return 2.0;
    };

    let exact = match block {
        TimeBlock::Morning | TimeBlock::Peak => Morning,
        TimeBlock::Afternoon => Afternoon,
        TimeBlock::Evening => Evening,
    };
    let compatible: &[GapType] = match block {
        TimeBlock::Morning => &[BetweenMeetings, Lunch],
        TimeBlock::Peak => &[BetweenMeetings, Afternoon],
        TimeBlock::Afternoon => &[Lunch, BetweenMeetings, Evening],
        TimeBlock::Evening => &[Night, Afternoon],
    };

    if gap_type == exact {
        5.0
    } else if compatible.contains(&gap_type) {
        3.0
    } else {
        0.0
    }
}

/// Priority alignment (0-5 points).
///
/// - High priority in a large gap = 5
/// - Medium priority in a medium gap = 3
/// - Low priority in a small gap = 2
/// - Anything else = 1
pub fn priority_alignment_score(priority: Priority, size: GapSize) -> f64 {
    match (priority, size) {
        (Priority::High, GapSize::Large) => 5.0,
        (Priority::Medium, GapSize::Medium) => 3.0,
        (Priority::Low, GapSize::Small) => 2.0,
        _ => 1.0,
    }
}

/// Deterministic rubric scorer.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlgorithmicScorer;

impl AlgorithmicScorer {
    pub fn new() -> Self {
        Self
    }

    /// Sub-scores for one pair.
    pub fn score(&self, task: &TaskToAnchor, slot: &AvailableSlot) -> ScoreComponents {
        ScoreComponents::new()
            .with(
                Criterion::DurationFit,
                duration_fit_score(task.estimated_minutes, slot.duration_minutes()),
            )
            .with(
                Criterion::TimeWindow,
                time_window_score(task.preferred_block, slot.gap_type),
            )
            .with(
                Criterion::PriorityAlignment,
                priority_alignment_score(task.priority, slot.size),
            )
    }

    pub fn score_pair(&self, task: &TaskToAnchor, slot: &AvailableSlot) -> TaskSlotScore {
        TaskSlotScore::algorithmic(&task.id, &slot.id, self.score(task, slot))
    }

    /// Score every pair, task-major: index `t * slots.len() + s`.
    pub fn score_all(&self, tasks: &[TaskToAnchor], slots: &[AvailableSlot]) -> Vec<TaskSlotScore> {
        tasks
            .iter()
            .flat_map(|task| slots.iter().map(move |slot| self.score_pair(task, slot)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::ALGORITHMIC_MAX;
    use chrono::{Duration, TimeZone, Utc};

    fn make_slot(minutes: i64, gap_type: GapType) -> AvailableSlot {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
        AvailableSlot {
            id: "slot-01".into(),
            start_time: start,
            end_time: start + Duration::minutes(minutes),
            gap_type,
            size: GapSize::from_minutes(minutes),
            preceding_event_id: None,
            following_event_id: None,
        }
    }

    #[test]
    fn test_duration_fit_bands() {
        assert_eq!(duration_fit_score(60, 60), 5.0);
        assert_eq!(duration_fit_score(57, 60), 5.0);
        assert_eq!(duration_fit_score(50, 60), 4.0);
        assert_eq!(duration_fit_score(40, 60), 3.0);
        assert_eq!(duration_fit_score(30, 60), 2.0);
        assert_eq!(duration_fit_score(15, 60), 1.0);
        assert_eq!(duration_fit_score(10, 60), 0.0);
        // symmetric: a task longer than the slot is scored on the same ratio
        assert_eq!(duration_fit_score(60, 50), 4.0);
    }

    #[test]
    fn test_time_window_table() {
        assert_eq!(time_window_score(Some(TimeBlock::Morning), GapType::Morning), 5.0);
        assert_eq!(time_window_score(Some(TimeBlock::Peak), GapType::Morning), 5.0);
        assert_eq!(time_window_score(Some(TimeBlock::Morning), GapType::BetweenMeetings), 3.0);
        assert_eq!(time_window_score(Some(TimeBlock::Evening), GapType::Night), 3.0);
        assert_eq!(time_window_score(None, GapType::Night), 2.0);
        assert_eq!(time_window_score(Some(TimeBlock::Morning), GapType::Evening), 0.0);
        assert_eq!(time_window_score(Some(TimeBlock::Peak), GapType::Night), 0.0);
    }

    #[test]
    fn test_priority_alignment_table() {
        assert_eq!(priority_alignment_score(Priority::High, GapSize::Large), 5.0);
        assert_eq!(priority_alignment_score(Priority::Medium, GapSize::Medium), 3.0);
        assert_eq!(priority_alignment_score(Priority::Low, GapSize::Small), 2.0);
        assert_eq!(priority_alignment_score(Priority::High, GapSize::Small), 1.0);
        assert_eq!(priority_alignment_score(Priority::Low, GapSize::Large), 1.0);
    }

    #[test]
    fn test_perfect_pair() {
        let task = TaskToAnchor::new("t1", "Deep work", 90)
            .with_priority(Priority::High)
            .with_preferred_block(TimeBlock::Morning);
        let slot = make_slot(90, GapType::Morning);

        let score = AlgorithmicScorer::new().score_pair(&task, &slot);
        assert_eq!(score.total(), ALGORITHMIC_MAX);
        assert_eq!(score.confidence(), 100.0);
        assert_eq!(score.task_id(), "t1");
        assert_eq!(score.slot_id(), "slot-01");
    }

    #[test]
    fn test_score_all_is_task_major() {
        let tasks = vec![
            TaskToAnchor::new("t1", "One", 30),
            TaskToAnchor::new("t2", "Two", 30),
        ];
        let mut second = make_slot(45, GapType::Afternoon);
        second.id = "slot-02".into();
        let slots = vec![make_slot(30, GapType::Morning), second];

        let scores = AlgorithmicScorer::new().score_all(&tasks, &slots);
        let keys: Vec<_> = scores.iter().map(|s| (s.task_id(), s.slot_id())).collect();
        assert_eq!(
            keys,
            vec![
                ("t1", "slot-01"),
                ("t1", "slot-02"),
                ("t2", "slot-01"),
                ("t2", "slot-02")
            ]
        );
        for score in &scores {
            assert!(score.total() <= ALGORITHMIC_MAX);
        }
    }
}
