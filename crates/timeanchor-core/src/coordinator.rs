//! End-to-end anchoring run.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Collecting -> Scoring(mode) -> Assigning -> Done
//! ```
//!
//! `Done` always carries an [`AssignmentResult`], possibly empty. A failed
//! or cancelled run returns to `Idle` without producing one. The
//! coordinator is the only component that knows about [`ScoringMode`].

use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::assignment::{AssignmentResult, GreedyAssigner};
use crate::calendar::{CalendarEvent, CalendarSource};
use crate::config::AnchorConfig;
use crate::error::{CoreError, Result};
use crate::oracle::ScoringOracle;
use crate::scoring::{AlgorithmicScorer, HybridScorer, HybridStats, SemanticScorer};
use crate::task::{TaskSource, TaskToAnchor};
use crate::timeline::{AvailableSlot, GapFinder, WorkingHours};

/// Which scorer tiers a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMode {
    #[default]
    Algorithmic,
    Hybrid,
}

impl ScoringMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Algorithmic => "algorithmic",
            Self::Hybrid => "hybrid",
        }
    }
}

impl FromStr for ScoringMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "algorithmic" => Ok(Self::Algorithmic),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(format!(
                "unknown scoring mode '{other}' (expected algorithmic or hybrid)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    Collecting,
    Scoring(ScoringMode),
    Assigning,
    Done,
}

/// Everything one run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchoringReport {
    pub run_id: String,
    pub date: NaiveDate,
    /// Mode actually used, after any fallback
    pub mode: ScoringMode,
    pub slots: Vec<AvailableSlot>,
    pub result: AssignmentResult,
    /// Oracle counters, hybrid runs only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic: Option<HybridStats>,
}

/// Drives gap finding, scoring and assignment for one day.
pub struct AnchoringCoordinator {
    gap_finder: GapFinder,
    working_hours: WorkingHours,
    mode: ScoringMode,
    algorithmic: AlgorithmicScorer,
    hybrid: Option<HybridScorer>,
    assigner: GreedyAssigner,
    state: CoordinatorState,
}

impl AnchoringCoordinator {
    /// Algorithmic mode, default gap finder and working hours
    pub fn new() -> Self {
        Self {
            gap_finder: GapFinder::new(),
            working_hours: WorkingHours::default(),
            mode: ScoringMode::Algorithmic,
            algorithmic: AlgorithmicScorer::new(),
            hybrid: None,
            assigner: GreedyAssigner::new(),
            state: CoordinatorState::Idle,
        }
    }

    /// Build every component from `config`.
    ///
    /// `oracle` is only needed for hybrid mode; without one a hybrid run
    /// degrades to algorithmic scoring.
    pub fn from_config(
        config: &AnchorConfig,
        oracle: Option<Arc<dyn ScoringOracle>>,
    ) -> Result<Self> {
        config.validate()?;

        let hybrid = oracle.map(|oracle| {
            HybridScorer::new(SemanticScorer::new(oracle, config.oracle_timeout()))
                .with_top_n(config.scoring.top_n)
                .with_cost_optimization(config.scoring.cost_optimized)
                .with_max_concurrency(config.scoring.max_concurrency)
                .with_context_window(config.scoring.context_window)
        });

        Ok(Self {
            gap_finder: config.gap_finder()?,
            working_hours: config.working_hours()?,
            mode: config.scoring.mode,
            hybrid,
            ..Self::new()
        })
    }

    pub fn with_gap_finder(mut self, gap_finder: GapFinder) -> Self {
        self.gap_finder = gap_finder;
        self
    }

    pub fn with_working_hours(mut self, hours: WorkingHours) -> Self {
        self.working_hours = hours;
        self
    }

    pub fn with_mode(mut self, mode: ScoringMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_hybrid(mut self, scorer: HybridScorer) -> Self {
        self.hybrid = Some(scorer);
        self
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    pub fn mode(&self) -> ScoringMode {
        self.mode
    }

    /// Fetch the day's events and tasks, then run [`Self::anchor`].
    pub async fn run_for_user(
        &mut self,
        calendar: &dyn CalendarSource,
        tasks: &dyn TaskSource,
        user_id: &str,
        date: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<AnchoringReport> {
        tracing::debug!(
            user_id,
            %date,
            calendar = calendar.name(),
            tasks = tasks.name(),
            "collecting inputs"
        );

        let collected = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CoreError::Cancelled { stage: "collecting" }),
            fetched = async {
                tokio::try_join!(
                    async {
                        calendar
                            .fetch_events(user_id, date)
                            .await
                            .map_err(|e| CoreError::source(calendar.name(), e))
                    },
                    async {
                        tasks
                            .load_tasks(user_id, date)
                            .await
                            .map_err(|e| CoreError::source(tasks.name(), e))
                    }
                )
            } => fetched,
        };

        match collected {
            Ok((events, task_list)) => self.anchor(date, &events, &task_list, cancel).await,
            Err(err) => {
                self.transition(CoordinatorState::Idle);
                Err(err)
            }
        }
    }

    /// Anchor `tasks` into the gaps between `events` on `date`.
    ///
    /// Empty inputs give an empty but complete report. Invalid events or
    /// tasks, and cancellation, return an error and reset to `Idle`.
    pub async fn anchor(
        &mut self,
        date: NaiveDate,
        events: &[CalendarEvent],
        tasks: &[TaskToAnchor],
        cancel: &CancellationToken,
    ) -> Result<AnchoringReport> {
        let outcome = self.run(date, events, tasks, cancel).await;
        if let Err(err) = &outcome {
            if err.is_cancelled() {
                tracing::warn!(%date, "anchoring run cancelled");
            }
            self.transition(CoordinatorState::Idle);
        }
        outcome
    }

    async fn run(
        &mut self,
        date: NaiveDate,
        events: &[CalendarEvent],
        tasks: &[TaskToAnchor],
        cancel: &CancellationToken,
    ) -> Result<AnchoringReport> {
        let run_id = uuid::Uuid::new_v4().to_string();
        self.transition(CoordinatorState::Collecting);

        for event in events {
            event.validate()?;
        }
        for task in tasks {
            task.validate()?;
        }
        let slots = self
            .gap_finder
            .find_gaps_on(events, date, &self.working_hours)?;
        tracing::debug!(
            run_id = %run_id,
            events = events.len(),
            tasks = tasks.len(),
            slots = slots.len(),
            "inputs collected"
        );

        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled { stage: "collecting" });
        }

        let mode = self.effective_mode();
        self.transition(CoordinatorState::Scoring(mode));
        let (scores, semantic) = match (mode, &self.hybrid) {
            (ScoringMode::Hybrid, Some(hybrid)) => {
                let scored = hybrid.score_all(tasks, &slots, events, cancel).await?;
                (scored.scores, Some(scored.stats))
            }
            _ => (self.algorithmic.score_all(tasks, &slots), None),
        };

        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled { stage: "scoring" });
        }

        self.transition(CoordinatorState::Assigning);
        let result = self.assigner.assign(&scores, tasks, &slots)?;
        self.transition(CoordinatorState::Done);

        let stats = semantic.unwrap_or_default();
        tracing::info!(
            run_id = %run_id,
            mode = mode.as_str(),
            anchored = result.tasks_anchored,
            total = result.total_tasks,
            average_confidence = result.average_confidence,
            oracle_calls = stats.oracle_calls,
            fallbacks = stats.fallbacks,
            "anchoring run complete"
        );

        Ok(AnchoringReport {
            run_id,
            date,
            mode,
            slots,
            result,
            semantic,
        })
    }

    fn effective_mode(&self) -> ScoringMode {
        match (self.mode, &self.hybrid) {
            (ScoringMode::Hybrid, None) => {
                tracing::warn!("hybrid mode requested without a scoring oracle; using algorithmic scoring");
                ScoringMode::Algorithmic
            }
            (mode, _) => mode,
        }
    }

    fn transition(&mut self, next: CoordinatorState) {
        tracing::debug!(from = ?self.state, to = ?next, "coordinator state");
        self.state = next;
    }
}

impl Default for AnchoringCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
