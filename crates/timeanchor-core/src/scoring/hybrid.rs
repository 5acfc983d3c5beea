//! Hybrid scoring: exhaustive rubric plus cost-bounded oracle calls.
//!
//! Every pair gets an algorithmic score. With cost optimization on, only
//! each task's top-N feasible slots (by algorithmic score) are sent to the
//! oracle, bounding calls to `tasks x N`. Pairs left out carry a semantic
//! score of zero but stay in the candidate pool.
//!
//! Oracle calls fan out with at most `max_concurrency` in flight. Each call
//! owns one preallocated entry of the verdict table, keyed by pair index,
//! and the table is merged only after every call has resolved.

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::calendar::CalendarEvent;
use crate::error::{CoreError, Result};
use crate::scoring::{AlgorithmicScorer, ScoreComponents, SemanticScorer, SemanticVerdict, TaskSlotScore};
use crate::task::TaskToAnchor;
use crate::timeline::AvailableSlot;

/// Counters from one hybrid scoring pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HybridStats {
    pub pairs_scored: usize,
    pub oracle_calls: usize,
    pub fallbacks: usize,
}

/// Full score table of a hybrid pass, task-major.
#[derive(Debug, Clone)]
pub struct HybridScores {
    pub scores: Vec<TaskSlotScore>,
    pub stats: HybridStats,
}

/// Combines the algorithmic and semantic tiers.
#[derive(Clone)]
pub struct HybridScorer {
    algorithmic: AlgorithmicScorer,
    semantic: SemanticScorer,
    top_n: usize,
    cost_optimized: bool,
    max_concurrency: usize,
    context_window: usize,
}

impl HybridScorer {
    /// Top-3, cost optimized, 4 calls in flight, 2 context events per side
    pub fn new(semantic: SemanticScorer) -> Self {
        Self {
            algorithmic: AlgorithmicScorer::new(),
            semantic,
            top_n: 3,
            cost_optimized: true,
            max_concurrency: 4,
            context_window: 2,
        }
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n.max(1);
        self
    }

    /// When off, every pair is sent to the oracle.
    pub fn with_cost_optimization(mut self, enabled: bool) -> Self {
        self.cost_optimized = enabled;
        self
    }

    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = limit.max(1);
        self
    }

    pub fn with_context_window(mut self, events_per_side: usize) -> Self {
        self.context_window = events_per_side;
        self
    }

    pub fn top_n(&self) -> usize {
        self.top_n
    }

    /// Pair indices (`t * slots.len() + s`) that go to the oracle.
    ///
    /// Per task, every slot is ranked by algorithmic total, then by start
    /// time, then by input order, and the first `top_n` kept. Slots too short
    /// for the task still compete; assignment skips them later.
    pub fn select_for_semantic(
        &self,
        tasks: &[TaskToAnchor],
        slots: &[AvailableSlot],
        algorithmic: &[ScoreComponents],
    ) -> Vec<usize> {
        let width = slots.len();
        if !self.cost_optimized {
            return (0..tasks.len() * width).collect();
        }

        let mut selected = Vec::with_capacity(tasks.len() * self.top_n.min(width));
        for t in 0..tasks.len() {
            let mut ranked: Vec<usize> = (0..width).collect();
            ranked.sort_by(|&a, &b| {
                let (sa, sb) = (&algorithmic[t * width + a], &algorithmic[t * width + b]);
                sb.total()
                    .total_cmp(&sa.total())
                    .then(slots[a].start_time.cmp(&slots[b].start_time))
                    .then(a.cmp(&b))
            });
            selected.extend(ranked.into_iter().take(self.top_n).map(|s| t * width + s));
        }
        selected
    }

    /// Score every (task, slot) pair.
    ///
    /// Returns [`CoreError::Cancelled`] if `cancel` fires before every
    /// oracle call has resolved; in-flight calls are dropped.
    pub async fn score_all(
        &self,
        tasks: &[TaskToAnchor],
        slots: &[AvailableSlot],
        events: &[CalendarEvent],
        cancel: &CancellationToken,
    ) -> Result<HybridScores> {
        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled { stage: "scoring" });
        }

        let width = slots.len();
        let algorithmic: Vec<ScoreComponents> = tasks
            .iter()
            .flat_map(|task| slots.iter().map(move |slot| self.algorithmic.score(task, slot)))
            .collect();

        let selected = self.select_for_semantic(tasks, slots, &algorithmic);
        let contexts: Vec<Vec<&CalendarEvent>> = slots
            .iter()
            .map(|slot| slot.surrounding_events(events, self.context_window))
            .collect();

        tracing::debug!(
            pairs = algorithmic.len(),
            oracle_calls = selected.len(),
            max_concurrency = self.max_concurrency,
            "starting semantic fan-out"
        );

        let calls = stream::iter(selected.iter().copied().map(|idx| {
            let task = &tasks[idx / width];
            let slot = &slots[idx % width];
            let context = contexts[idx % width].as_slice();
            async move { (idx, self.semantic.score(task, slot, context).await) }
        }))
        .buffer_unordered(self.max_concurrency)
        .collect::<Vec<_>>();

        let completed = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::warn!("scoring cancelled; abandoning in-flight oracle calls");
                return Err(CoreError::Cancelled { stage: "scoring" });
            }
            done = calls => done,
        };

        let mut verdicts: Vec<Option<SemanticVerdict>> = vec![None; algorithmic.len()];
        for (idx, verdict) in completed {
            verdicts[idx] = Some(verdict);
        }

        let stats = HybridStats {
            pairs_scored: algorithmic.len(),
            oracle_calls: selected.len(),
            fallbacks: verdicts.iter().flatten().filter(|v| v.fallback).count(),
        };

        let scores = algorithmic
            .into_iter()
            .zip(verdicts)
            .enumerate()
            .map(|(idx, (components, verdict))| {
                TaskSlotScore::hybrid(
                    &tasks[idx / width].id,
                    &slots[idx % width].id,
                    components,
                    verdict,
                )
            })
            .collect();

        Ok(HybridScores { scores, stats })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OracleError;
    use crate::oracle::{OracleRequest, OracleResponse, ScoringOracle};
    use crate::scoring::HYBRID_MAX;
    use crate::timeline::{GapSize, GapType};
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Answers 6/6/6 after a short delay, tracking concurrency.
    #[derive(Default)]
    struct CountingOracle {
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl ScoringOracle for CountingOracle {
        fn name(&self) -> &str {
            "counting"
        }

        async fn evaluate(&self, _request: &OracleRequest) -> Result<OracleResponse, OracleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(OracleResponse {
                task_context: 6.0,
                dependency_flow: 6.0,
                energy_focus: 6.0,
                reasoning: String::new(),
                model_id: "counting".into(),
            })
        }
    }

    struct HangingOracle;

    #[async_trait]
    impl ScoringOracle for HangingOracle {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn evaluate(&self, _request: &OracleRequest) -> Result<OracleResponse, OracleError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Err(OracleError::Unavailable("unreachable".into()))
        }
    }

    fn slots(durations: &[i64]) -> Vec<AvailableSlot> {
        let mut start = Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap();
        durations
            .iter()
            .enumerate()
            .map(|(i, minutes)| {
                let slot = AvailableSlot {
                    id: format!("slot-{:02}", i + 1),
                    start_time: start,
                    end_time: start + ChronoDuration::minutes(*minutes),
                    gap_type: GapType::Morning,
                    size: GapSize::from_minutes(*minutes),
                    preceding_event_id: None,
                    following_event_id: None,
                };
                start = slot.end_time + ChronoDuration::minutes(30);
                slot
            })
            .collect()
    }

    fn scorer(oracle: Arc<dyn ScoringOracle>) -> HybridScorer {
        HybridScorer::new(SemanticScorer::new(oracle, Duration::from_secs(1)))
    }

    #[tokio::test]
    async fn test_semantic_only_for_top_n() {
        let oracle = Arc::new(CountingOracle::default());
        let tasks = vec![
            TaskToAnchor::new("t1", "Report", 30),
            TaskToAnchor::new("t2", "Email", 15),
        ];
        let slots = slots(&[30, 45, 60, 90, 120]);

        let result = scorer(oracle.clone())
            .with_top_n(2)
            .score_all(&tasks, &slots, &[], &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(oracle.calls.load(Ordering::SeqCst), 4);
        assert_eq!(result.stats.oracle_calls, 4);
        assert_eq!(result.stats.pairs_scored, 10);
        assert_eq!(result.stats.fallbacks, 0);

        let with_semantic = result.scores.iter().filter(|s| s.semantic().is_some()).count();
        assert_eq!(with_semantic, 4);
        for score in &result.scores {
            assert_eq!(score.total(), score.algorithmic_total() + score.semantic_total());
            assert!(score.total() <= HYBRID_MAX);
            if score.semantic().is_none() {
                assert_eq!(score.semantic_total(), 0.0);
            }
        }
        // the 30-minute task's best fit is the 30-minute slot
        let best = &result.scores[0];
        assert_eq!((best.task_id(), best.slot_id()), ("t1", "slot-01"));
        assert!(best.semantic().is_some());
    }

    #[tokio::test]
    async fn test_top_n_ranks_slots_the_task_cannot_fit() {
        let oracle = Arc::new(CountingOracle::default());
        let tasks = vec![TaskToAnchor::new("t1", "Long build", 60)];
        // 57 min scores a full duration fit but is three minutes short
        let slots = slots(&[57, 120, 30]);

        let result = scorer(oracle.clone())
            .with_top_n(1)
            .score_all(&tasks, &slots, &[], &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
        assert!(result.scores[0].semantic().is_some());
        assert!(result.scores[1].semantic().is_none());
        assert!(result.scores[2].semantic().is_none());

        let assigned = crate::assignment::GreedyAssigner::new()
            .assign(&result.scores, &tasks, &slots)
            .unwrap();
        assert_eq!(assigned.assignments[0].slot_id, "slot-02");
    }

    #[tokio::test]
    async fn test_without_cost_optimization_every_pair_is_scored() {
        let oracle = Arc::new(CountingOracle::default());
        let tasks = vec![
            TaskToAnchor::new("t1", "A", 30),
            TaskToAnchor::new("t2", "B", 30),
        ];
        let slots = slots(&[30, 45, 60, 90]);

        let result = scorer(oracle.clone())
            .with_cost_optimization(false)
            .score_all(&tasks, &slots, &[], &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 8);
        assert!(result.scores.iter().all(|s| s.semantic().is_some()));
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let oracle = Arc::new(CountingOracle::default());
        let tasks: Vec<_> = (0..6)
            .map(|i| TaskToAnchor::new(format!("t{i}"), "Task", 20))
            .collect();
        let slots = slots(&[30, 30, 30, 30]);

        scorer(oracle.clone())
            .with_top_n(4)
            .with_max_concurrency(3)
            .score_all(&tasks, &slots, &[], &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(oracle.calls.load(Ordering::SeqCst), 24);
        assert!(oracle.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_cancellation_abandons_scoring() {
        let tasks = vec![TaskToAnchor::new("t1", "A", 30)];
        let slots = slots(&[30, 60]);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let scorer = HybridScorer::new(SemanticScorer::new(
            Arc::new(HangingOracle),
            Duration::from_secs(120),
        ));
        let err = scorer.score_all(&tasks, &slots, &[], &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_empty_inputs() {
        let oracle = Arc::new(CountingOracle::default());
        let result = scorer(oracle.clone())
            .score_all(&[], &slots(&[30]), &[], &CancellationToken::new())
            .await
            .unwrap();
        assert!(result.scores.is_empty());

        let result = scorer(oracle)
            .score_all(&[TaskToAnchor::new("t1", "A", 30)], &[], &[], &CancellationToken::new())
            .await
            .unwrap();
        assert!(result.scores.is_empty());
        assert_eq!(result.stats, HybridStats::default());
    }
}
