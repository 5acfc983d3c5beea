//! Greedy one-to-one assignment of tasks to slots.
//!
//! All scored pairs are ranked once, then walked in order; a pair is
//! committed when neither its task nor its slot is taken yet and the task
//! fits the slot. The matching is locally optimal per decision, not a
//! global optimum.
//!
//! Ranking, highest first:
//! 1. total score
//! 2. task priority (high, medium, low)
//! 3. earlier slot start
//! 4. input order of the scored pair

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::scoring::{ScoreComponents, TaskSlotScore};
use crate::task::TaskToAnchor;
use crate::timeline::AvailableSlot;

/// A task fixed into a slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskAssignment {
    pub task_id: String,
    pub task_title: String,
    pub slot_id: String,
    pub anchored_start: DateTime<Utc>,
    pub anchored_end: DateTime<Utc>,
    pub original_start: Option<DateTime<Utc>>,
    pub original_end: Option<DateTime<Utc>>,
    /// Anchored start minus original start, 0 without an original time
    pub adjustment_minutes: i64,
    pub confidence: f64,
    pub total_score: f64,
    pub breakdown: ScoreComponents,
    /// Oracle explanation, when one was given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl TaskAssignment {
    /// Whether the task had an original time and was moved off it
    pub fn is_rescheduled(&self) -> bool {
        self.original_start
            .is_some_and(|original| original != self.anchored_start)
    }
}

/// Why a task did not get a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnassignedReason {
    /// No scored pair referenced the task, e.g. the day had no gaps
    NoCandidates,
    /// The task is longer than every slot it was scored against
    NoFittingSlot,
    /// Every slot it fits was claimed by a higher-ranked pair
    SlotsTaken,
}

impl UnassignedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoCandidates => "no candidate slots",
            Self::NoFittingSlot => "longer than every available slot",
            Self::SlotsTaken => "every fitting slot was taken",
        }
    }
}

/// A task left out of the assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnassignedTask {
    pub task_id: String,
    pub title: String,
    pub reason: UnassignedReason,
}

/// Outcome of one assignment pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentResult {
    /// Committed assignments in chronological order
    pub assignments: Vec<TaskAssignment>,
    /// Unassigned tasks in input order
    pub unassigned: Vec<UnassignedTask>,
    pub total_tasks: usize,
    pub tasks_anchored: usize,
    pub tasks_rescheduled: usize,
    pub tasks_kept_original: usize,
    pub tasks_unassigned: usize,
    /// Mean confidence of the committed assignments, 0 when none
    pub average_confidence: f64,
}

impl AssignmentResult {
    pub fn assignment_for(&self, task_id: &str) -> Option<&TaskAssignment> {
        self.assignments.iter().find(|a| a.task_id == task_id)
    }

    /// Share of tasks anchored, 0-100
    pub fn anchor_rate(&self) -> f64 {
        if self.total_tasks == 0 {
            return 0.0;
        }
        self.tasks_anchored as f64 / self.total_tasks as f64 * 100.0
    }
}

/// Greedy assignment engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyAssigner;

impl GreedyAssigner {
    pub fn new() -> Self {
        Self
    }

    /// Assign tasks to slots from a pool of scored pairs.
    ///
    /// The pool may mix algorithmic-only and hybrid scores. Scores that
    /// reference a task or slot missing from the catalogs, and duplicate
    /// ids within a catalog, are contract violations.
    pub fn assign(
        &self,
        scores: &[TaskSlotScore],
        tasks: &[TaskToAnchor],
        slots: &[AvailableSlot],
    ) -> Result<AssignmentResult, ValidationError> {
        let task_index = index_by_id("task", tasks.iter().map(|t| t.id.as_str()))?;
        let slot_index = index_by_id("slot", slots.iter().map(|s| s.id.as_str()))?;

        let mut ranked = Vec::with_capacity(scores.len());
        for (order, score) in scores.iter().enumerate() {
            let t = *task_index
                .get(score.task_id())
                .ok_or_else(|| ValidationError::UnknownTask(score.task_id().to_string()))?;
            let s = *slot_index
                .get(score.slot_id())
                .ok_or_else(|| ValidationError::UnknownSlot(score.slot_id().to_string()))?;
            ranked.push((order, t, s));
        }

        ranked.sort_by(|&(oa, ta, sa), &(ob, tb, sb)| {
            scores[ob]
                .total()
                .total_cmp(&scores[oa].total())
                .then(tasks[ta].priority.rank().cmp(&tasks[tb].priority.rank()))
                .then(slots[sa].start_time.cmp(&slots[sb].start_time))
                .then(oa.cmp(&ob))
        });

        let mut task_used = vec![false; tasks.len()];
        let mut slot_used = vec![false; slots.len()];
        let mut assignments = Vec::new();

        for (order, t, s) in ranked {
            if task_used[t] || slot_used[s] {
                continue;
            }
            let (task, slot) = (&tasks[t], &slots[s]);
            if !slot.can_fit(task.estimated_minutes) {
                continue;
            }

            task_used[t] = true;
            slot_used[s] = true;
            assignments.push(Self::commit(task, slot, &scores[order]));
        }

        assignments.sort_by(|a, b| {
            a.anchored_start
                .cmp(&b.anchored_start)
                .then_with(|| a.task_id.cmp(&b.task_id))
        });

        let unassigned: Vec<UnassignedTask> = tasks
            .iter()
            .enumerate()
            .filter(|(t, _)| !task_used[*t])
            .map(|(t, task)| UnassignedTask {
                task_id: task.id.clone(),
                title: task.title.clone(),
                reason: Self::reason(t, task, scores, &task_index, &slot_index, slots),
            })
            .collect();

        let tasks_rescheduled = assignments.iter().filter(|a| a.is_rescheduled()).count();
        let average_confidence = if assignments.is_empty() {
            0.0
        } else {
            assignments.iter().map(|a| a.confidence).sum::<f64>() / assignments.len() as f64
        };

        Ok(AssignmentResult {
            total_tasks: tasks.len(),
            tasks_anchored: assignments.len(),
            tasks_rescheduled,
            tasks_kept_original: assignments.len() - tasks_rescheduled,
            tasks_unassigned: unassigned.len(),
            average_confidence,
            assignments,
            unassigned,
        })
    }

    fn commit(task: &TaskToAnchor, slot: &AvailableSlot, score: &TaskSlotScore) -> TaskAssignment {
        let anchored_start = slot.start_time;
        let adjustment_minutes = task
            .original_start
            .map_or(0, |original| (anchored_start - original).num_minutes());

        TaskAssignment {
            task_id: task.id.clone(),
            task_title: task.title.clone(),
            slot_id: slot.id.clone(),
            anchored_start,
            anchored_end: anchored_start + Duration::minutes(task.estimated_minutes),
            original_start: task.original_start,
            original_end: task.original_end,
            adjustment_minutes,
            confidence: score.confidence(),
            total_score: score.total(),
            breakdown: score.components(),
            reasoning: score
                .semantic()
                .map(|v| v.reasoning.clone())
                .filter(|r| !r.is_empty()),
        }
    }

    fn reason(
        t: usize,
        task: &TaskToAnchor,
        scores: &[TaskSlotScore],
        task_index: &HashMap<&str, usize>,
        slot_index: &HashMap<&str, usize>,
        slots: &[AvailableSlot],
    ) -> UnassignedReason {
        let mut candidates = scores
            .iter()
            .filter(|score| task_index.get(score.task_id()) == Some(&t))
            .filter_map(|score| slot_index.get(score.slot_id()).map(|&s| &slots[s]))
            .peekable();

        if candidates.peek().is_none() {
            UnassignedReason::NoCandidates
        } else if candidates.any(|slot| slot.can_fit(task.estimated_minutes)) {
            UnassignedReason::SlotsTaken
        } else {
            UnassignedReason::NoFittingSlot
        }
    }
}

fn index_by_id<'a>(
    kind: &'static str,
    ids: impl Iterator<Item = &'a str>,
) -> Result<HashMap<&'a str, usize>, ValidationError> {
    let mut index = HashMap::new();
    for (i, id) in ids.enumerate() {
        if index.insert(id, i).is_some() {
            return Err(ValidationError::DuplicateId {
                kind,
                id: id.to_string(),
            });
        }
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::{AlgorithmicScorer, Criterion};
    use crate::task::Priority;
    use crate::timeline::{GapSize, GapType};
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, hour, minute, 0).unwrap()
    }

    fn make_slot(id: &str, start: DateTime<Utc>, minutes: i64) -> AvailableSlot {
        AvailableSlot {
            id: id.into(),
            start_time: start,
            end_time: start + Duration::minutes(minutes),
            gap_type: GapType::Morning,
            size: GapSize::from_minutes(minutes),
            preceding_event_id: None,
            following_event_id: None,
        }
    }

    fn fixed(task: &str, slot: &str, total: f64) -> TaskSlotScore {
        // spread the total over the three rubric criteria
        let components = ScoreComponents::new()
            .with(Criterion::DurationFit, total.min(5.0))
            .with(Criterion::TimeWindow, (total - 5.0).clamp(0.0, 5.0))
            .with(Criterion::PriorityAlignment, (total - 10.0).clamp(0.0, 5.0));
        TaskSlotScore::algorithmic(task, slot, components)
    }

    #[test]
    fn test_highest_score_wins_contested_slot() {
        let tasks = vec![
            TaskToAnchor::new("t1", "One", 30),
            TaskToAnchor::new("t2", "Two", 30),
        ];
        let slots = vec![make_slot("s1", at(9, 0), 30), make_slot("s2", at(11, 0), 60)];
        let scores = vec![
            fixed("t1", "s1", 10.0),
            fixed("t1", "s2", 9.0),
            fixed("t2", "s1", 12.0),
            fixed("t2", "s2", 4.0),
        ];

        let result = GreedyAssigner::new().assign(&scores, &tasks, &slots).unwrap();
        assert_eq!(result.tasks_anchored, 2);
        assert_eq!(result.assignment_for("t2").unwrap().slot_id, "s1");
        assert_eq!(result.assignment_for("t1").unwrap().slot_id, "s2");
        // chronological output
        assert_eq!(result.assignments[0].task_id, "t2");
    }

    #[test]
    fn test_ties_prefer_priority_then_earlier_slot() {
        let tasks = vec![
            TaskToAnchor::new("low", "Low", 30).with_priority(Priority::Low),
            TaskToAnchor::new("high", "High", 30).with_priority(Priority::High),
        ];
        let slots = vec![make_slot("late", at(15, 0), 30), make_slot("early", at(9, 0), 30)];
        let scores = vec![
            fixed("low", "late", 8.0),
            fixed("low", "early", 8.0),
            fixed("high", "late", 8.0),
            fixed("high", "early", 8.0),
        ];

        let result = GreedyAssigner::new().assign(&scores, &tasks, &slots).unwrap();
        assert_eq!(result.assignment_for("high").unwrap().slot_id, "early");
        assert_eq!(result.assignment_for("low").unwrap().slot_id, "late");
    }

    #[test]
    fn test_task_longer_than_every_slot_is_reported() {
        let tasks = vec![TaskToAnchor::new("big", "Migration", 240)];
        let slots = vec![make_slot("s1", at(9, 0), 60), make_slot("s2", at(13, 0), 90)];
        let scores = AlgorithmicScorer::new().score_all(&tasks, &slots);

        let result = GreedyAssigner::new().assign(&scores, &tasks, &slots).unwrap();
        assert!(result.assignments.is_empty());
        assert_eq!(result.tasks_unassigned, 1);
        assert_eq!(result.unassigned[0].task_id, "big");
        assert_eq!(result.unassigned[0].reason, UnassignedReason::NoFittingSlot);
    }

    #[test]
    fn test_slots_taken_and_no_candidates() {
        let tasks = vec![
            TaskToAnchor::new("t1", "One", 30),
            TaskToAnchor::new("t2", "Two", 30),
        ];
        let slots = vec![make_slot("s1", at(9, 0), 30)];
        let scores = vec![fixed("t1", "s1", 9.0), fixed("t2", "s1", 7.0)];

        let result = GreedyAssigner::new().assign(&scores, &tasks, &slots).unwrap();
        assert_eq!(result.unassigned[0].reason, UnassignedReason::SlotsTaken);

        let result = GreedyAssigner::new().assign(&[], &tasks, &[]).unwrap();
        assert_eq!(result.tasks_unassigned, 2);
        assert!(result
            .unassigned
            .iter()
            .all(|u| u.reason == UnassignedReason::NoCandidates));
        assert_eq!(result.average_confidence, 0.0);
    }

    #[test]
    fn test_adjustment_and_reschedule_counts() {
        let tasks = vec![
            TaskToAnchor::new("moved", "Moved", 30).with_original_time(at(8, 0)),
            TaskToAnchor::new("kept", "Kept", 30).with_original_time(at(10, 0)),
            TaskToAnchor::new("new", "New", 30),
        ];
        let slots = vec![
            make_slot("s1", at(9, 30), 30),
            make_slot("s2", at(10, 0), 30),
            make_slot("s3", at(14, 0), 30),
        ];
        let scores = vec![
            fixed("moved", "s1", 15.0),
            fixed("kept", "s2", 15.0),
            fixed("new", "s3", 15.0),
        ];

        let result = GreedyAssigner::new().assign(&scores, &tasks, &slots).unwrap();
        let moved = result.assignment_for("moved").unwrap();
        assert_eq!(moved.adjustment_minutes, 90);
        assert_eq!(moved.anchored_end, at(10, 0));
        assert_eq!(result.assignment_for("kept").unwrap().adjustment_minutes, 0);
        assert_eq!(result.assignment_for("new").unwrap().adjustment_minutes, 0);
        assert_eq!(result.tasks_rescheduled, 1);
        assert_eq!(result.tasks_kept_original, 2);
        assert_eq!(result.average_confidence, 100.0);
        assert_eq!(result.anchor_rate(), 100.0);
    }

    #[test]
    fn test_unknown_and_duplicate_ids_are_rejected() {
        let tasks = vec![TaskToAnchor::new("t1", "One", 30)];
        let slots = vec![make_slot("s1", at(9, 0), 30)];

        let err = GreedyAssigner::new()
            .assign(&[fixed("ghost", "s1", 5.0)], &tasks, &slots)
            .unwrap_err();
        assert_eq!(err, ValidationError::UnknownTask("ghost".into()));

        let err = GreedyAssigner::new()
            .assign(&[fixed("t1", "nowhere", 5.0)], &tasks, &slots)
            .unwrap_err();
        assert_eq!(err, ValidationError::UnknownSlot("nowhere".into()));

        let doubled = vec![tasks[0].clone(), tasks[0].clone()];
        let err = GreedyAssigner::new().assign(&[], &doubled, &slots).unwrap_err();
        assert!(matches!(err, ValidationError::DuplicateId { kind: "task", .. }));
    }

    #[test]
    fn test_assignment_is_repeatable() {
        let tasks: Vec<_> = (0..5)
            .map(|i| TaskToAnchor::new(format!("t{i}"), "Task", 30))
            .collect();
        let slots: Vec<_> = (0..4)
            .map(|i| make_slot(&format!("s{i}"), at(9 + i, 0), 30))
            .collect();
        // every pair scores the same, so only tie-breaks decide
        let scores = AlgorithmicScorer::new().score_all(&tasks, &slots);

        let first = GreedyAssigner::new().assign(&scores, &tasks, &slots).unwrap();
        let second = GreedyAssigner::new().assign(&scores, &tasks, &slots).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.tasks_anchored, 4);
        assert_eq!(first.assignment_for("t0").unwrap().slot_id, "s0");
        assert_eq!(first.unassigned[0].task_id, "t4");
    }
}
